//! Pseudo-token IL rendering.
//!
//! Renders an in-memory [`MethodBody`] as an ildasm-like listing:
//!
//! ```text
//! {
//!   // Code size        3 (0x3)
//!   .maxstack  1
//!   .locals init (bool V_0, //b
//!                 int V_1)
//!  -IL_0000:  nop
//!   IL_0001:  ldc.i4.1
//!   IL_0002:  ret
//! }
//! ```
//!
//! Operands are rendered by the front end with pseudo tokens, so the listing does not depend
//! on the metadata tokens the writer assigned.

use std::fmt::Write;

use crate::{
    compilation::{Instruction, MethodBody},
    visualizer::{markers::SequencePointMarkers, SequencePointDetail},
};

const MNEMONIC_WIDTH: usize = 10;

/// Render `body`.
///
/// With [`SequencePointDetail::None`] or without `markers` no markers are shown.
#[must_use]
pub fn render(
    body: &MethodBody,
    markers: Option<&SequencePointMarkers>,
    detail: SequencePointDetail,
) -> String {
    let mut output = String::new();
    let code_size = body.code_size();

    output.push_str("{\n");
    let _ = writeln!(output, "  // Code size {code_size:>8} (0x{code_size:x})");
    let _ = writeln!(output, "  .maxstack  {}", body.max_stack);
    render_locals(&mut output, body);

    let markers = match detail {
        SequencePointDetail::None => None,
        _ => markers,
    };

    for instruction in &body.instructions {
        let marker = markers.and_then(|markers| markers.at(instruction.offset));
        match (marker, detail) {
            (Some(marker), SequencePointDetail::Basic) => {
                let _ = write!(output, "{:>2}", marker.symbol());
            }
            (Some(marker), SequencePointDetail::Enhanced) => {
                let _ = writeln!(output, "  {}", marker.comment());
                output.push_str("  ");
            }
            _ => output.push_str("  "),
        }
        render_instruction(&mut output, instruction);
    }

    output.push_str("}\n");
    output
}

fn render_locals(output: &mut String, body: &MethodBody) {
    if body.locals.is_empty() {
        return;
    }

    let prefix = if body.locals_init {
        "  .locals init ("
    } else {
        "  .locals ("
    };
    let continuation = " ".repeat(prefix.len());

    for (index, local) in body.locals.iter().enumerate() {
        output.push_str(if index == 0 { prefix } else { &continuation });
        let _ = write!(output, "{} V_{}", local.ty, index);
        output.push(if index + 1 == body.locals.len() { ')' } else { ',' });
        if let Some(name) = &local.name {
            let _ = write!(output, " //{name}");
        }
        output.push('\n');
    }
}

fn render_instruction(output: &mut String, instruction: &Instruction) {
    let _ = write!(output, "IL_{:04x}:  ", instruction.offset);
    match &instruction.operand {
        Some(operand) => {
            let _ = writeln!(
                output,
                "{:<width$} {}",
                instruction.mnemonic,
                operand,
                width = MNEMONIC_WIDTH
            );
        }
        None => {
            output.push_str(&instruction.mnemonic);
            output.push('\n');
        }
    }
}
