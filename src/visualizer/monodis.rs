//! IL disassembly through `monodis`
//!
//! The module is written into a temporary directory and disassembled by the Mono
//! disassembler. Listings are cut out of the full disassembly by their brace blocks:
//! methods are found through the `// method line N` comment monodis writes before every
//! method definition, where `N` is the MethodDef row.

use std::{fs, path::PathBuf, process::Command, sync::OnceLock};

use tempfile::TempDir;
use tracing::debug;

use crate::{
    module::{ModuleRecord, Token},
    visualizer::{Disassembler, MemberEntry},
    Error, Result,
};

/// Disassembler tool wrapper for monodis
#[derive(Debug, Default)]
pub struct ProcessDisassembler {
    available: OnceLock<bool>,
}

impl ProcessDisassembler {
    /// Create new disassembler instance
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if monodis is available
    pub fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| Command::new("monodis").arg("--help").output().is_ok())
    }

    /// Run monodis with `flags` over `module` and return its standard output
    fn run(&self, module: &ModuleRecord, flags: &[&str]) -> Result<String> {
        if !self.is_available() {
            return Err(Error::Error("monodis not available".to_string()));
        }

        let directory = TempDir::new()?;
        let path: PathBuf = directory.path().join(module.file_name());
        fs::write(&path, module.image())?;

        debug!(module = module.simple_name(), ?flags, "running monodis");

        let output = Command::new("monodis")
            .args(flags)
            .arg(&path)
            .output()
            .map_err(|e| Error::Error(format!("Failed to execute monodis: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Error(format!(
                "monodis failed on '{}': {}",
                module.file_name(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Disassembler for ProcessDisassembler {
    fn enumerate_members(&self, module: &ModuleRecord) -> Result<Vec<MemberEntry>> {
        Ok(parse_method_table(&self.run(module, &["--method"])?))
    }

    fn disassemble_method(&self, module: &ModuleRecord, token: Token) -> Result<String> {
        let listing = self.run(module, &[])?;
        extract_method(&listing, token.row())
            .ok_or_else(|| Error::MethodNotFound(format!("{token} in '{}'", module.file_name())))
    }

    fn disassemble_type(&self, module: &ModuleRecord, type_name: &str) -> Result<String> {
        let listing = self.run(module, &[])?;
        extract_type(&listing, type_name).ok_or_else(|| {
            Error::Error(format!(
                "Type '{}' not found in '{}'",
                type_name,
                module.file_name()
            ))
        })
    }
}

/// Parse the output of `monodis --method`.
///
/// ```text
/// Method Table (1..2)
/// ########## N.C
/// 1: void M (int32) (param: 1 impl_flags: cil managed  flags: 0x0086 ...)
/// 2: instance default void .ctor () (param: 2 ...)
/// ```
fn parse_method_table(output: &str) -> Vec<MemberEntry> {
    let mut members = Vec::new();
    let mut current_type = String::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(type_name) = line.strip_prefix("##########") {
            current_type = type_name.trim().to_string();
            continue;
        }

        let Some((row, signature)) = line.split_once(':') else {
            continue;
        };
        let Ok(row) = row.trim().parse::<u32>() else {
            continue;
        };

        let head = signature.split_once('(').map_or(signature, |(head, _)| head);
        let Some(name) = head.split_whitespace().last() else {
            continue;
        };

        let name = if current_type.is_empty() {
            name.to_string()
        } else {
            format!("{current_type}.{name}")
        };
        members.push(MemberEntry {
            name,
            token: Token::method_def(row),
        });
    }

    members
}

/// Cut out the body of the method defined in MethodDef row `row`.
fn extract_method(listing: &str, row: u32) -> Option<String> {
    let lines: Vec<&str> = listing.lines().collect();
    let marker = format!("// method line {row}");
    let start = lines.iter().position(|line| line.trim() == marker)?;
    let open = start + lines[start..].iter().position(|line| line.trim().starts_with('{'))?;
    block(&lines, open)
}

/// Cut out the declaration of `type_name`, from its `.class` header to the closing brace.
fn extract_type(listing: &str, type_name: &str) -> Option<String> {
    let simple = type_name.rsplit('.').next().unwrap_or(type_name);
    let lines: Vec<&str> = listing.lines().collect();
    let start = lines.iter().position(|line| {
        let trimmed = line.trim();
        trimmed.starts_with(".class")
            && trimmed
                .split_whitespace()
                .any(|word| word == simple || word == type_name)
    })?;
    let open = start + lines[start..].iter().position(|line| line.trim().starts_with('{'))?;

    let mut text: String = lines[start..open]
        .iter()
        .map(|line| format!("{}\n", line.trim_end()))
        .collect();
    text.push_str(&block(&lines, open)?);
    Some(text)
}

/// The brace block opening at `lines[open]`, closing comments removed.
fn block(lines: &[&str], open: usize) -> Option<String> {
    let mut depth = 0usize;
    let mut text = String::new();

    for line in &lines[open..] {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            depth += 1;
        }
        if trimmed.starts_with('}') {
            depth = depth.checked_sub(1)?;
            let indent = &line[..line.len() - line.trim_start().len()];
            text.push_str(indent);
            text.push_str("}\n");
            if depth == 0 {
                return Some(text);
            }
            continue;
        }
        text.push_str(line.trim_end());
        text.push('\n');
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHOD_TABLE: &str = "Method Table (1..3)
########## Program
1: default void Main (string[]) (param: 1 impl_flags: cil managed  flags: 0x0096 (public hidebysig static))
2: instance default void '.ctor' () (param: 2 impl_flags: cil managed  flags: 0x1886)
########## N.Helper
3: default int32 Twice (int32) (param: 2 impl_flags: cil managed  flags: 0x0096)
";

    const LISTING: &str = "  .class public auto ansi beforefieldinit Program
  \textends [mscorlib]System.Object
  {

    // method line 1
    .method public static hidebysig
           default void Main (string[] args)  cil managed
    {
        // Method begins at RVA 0x2050
\t.entrypoint
\t// Code size 11 (0xb)
\t.maxstack 8
\tIL_0000:  ldstr \"Hello\"
\tIL_0005:  call void class [mscorlib]System.Console::WriteLine(string)
\tIL_000a:  ret
    } // end of method Program::Main

    // method line 2
    .method public hidebysig specialname rtspecialname
           instance default void '.ctor' ()  cil managed
    {
\tIL_0000:  ldarg.0
\tIL_0001:  call instance void object::'.ctor'()
\tIL_0006:  ret
    } // end of method Program::.ctor

  } // end of class Program
";

    #[test]
    fn method_table_is_parsed() {
        let members = parse_method_table(METHOD_TABLE);
        assert_eq!(
            members,
            vec![
                MemberEntry {
                    name: "Program.Main".into(),
                    token: Token(0x0600_0001)
                },
                MemberEntry {
                    name: "Program.'.ctor'".into(),
                    token: Token(0x0600_0002)
                },
                MemberEntry {
                    name: "N.Helper.Twice".into(),
                    token: Token(0x0600_0003)
                },
            ]
        );
    }

    #[test]
    fn method_block_is_extracted() {
        let body = extract_method(LISTING, 1).unwrap();
        assert!(body.starts_with("    {\n"));
        assert!(body.contains("IL_0000:  ldstr \"Hello\""));
        assert!(body.ends_with("    }\n"));
        assert!(!body.contains("end of method"));
        assert!(!body.contains("ldarg.0"));

        let ctor = extract_method(LISTING, 2).unwrap();
        assert!(ctor.contains("ldarg.0"));
        assert!(extract_method(LISTING, 3).is_none());
    }

    #[test]
    fn type_block_is_extracted() {
        let declaration = extract_type(LISTING, "Program").unwrap();
        assert!(declaration.starts_with("  .class public auto ansi beforefieldinit Program\n"));
        assert!(declaration.contains("// method line 2"));
        assert!(declaration.ends_with("  }\n"));
        assert!(extract_type(LISTING, "Missing").is_none());
    }

    #[test]
    fn unbalanced_block_is_rejected() {
        assert!(block(&["{", "  IL_0000:  ret"], 0).is_none());
    }
}
