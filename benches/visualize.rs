//! Benchmarks for IL listing rendering.
//!
//! Covers the pseudo-token renderer with and without sequence point markers and the marker
//! pass over an external listing.

extern crate emitscope;

use criterion::{criterion_group, criterion_main, Criterion};
use emitscope::{
    compilation::{Instruction, LocalSlot, MethodBody, SourceText},
    visualizer::{
        annotate_listing, pseudo, DebugDocument, SequencePointDetail, SequencePointMarkers,
    },
    Token,
};
use std::{fmt::Write, hint::black_box};

const METHOD: Token = Token(0x0600_0001);

/// Build a body of `count` instructions cycling through common opcode shapes.
fn body(count: u32) -> MethodBody {
    let mut instructions = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for index in 0..count {
        let instruction = match index % 4 {
            0 => Instruction::new(offset, 1, "ldloc.0"),
            1 => Instruction::new(offset, 5, "ldstr").with_operand("\"Hello\""),
            2 => Instruction::new(offset, 5, "call")
                .with_operand("\"void System.Console.WriteLine(string)\""),
            _ => Instruction::new(offset, 1, "nop"),
        };
        offset += instruction.size;
        instructions.push(instruction);
    }
    instructions.push(Instruction::new(offset, 1, "ret"));

    MethodBody {
        max_stack: 8,
        locals_init: true,
        locals: vec![
            LocalSlot::named("string", "greeting"),
            LocalSlot::temp("int"),
            LocalSlot::named("object", "state"),
        ],
        instructions,
    }
}

/// A source file with one statement per line and a debug document pointing a sequence
/// point at every fourth instruction.
fn markers(body: &MethodBody) -> SequencePointMarkers {
    let mut source = String::new();
    let mut xml = String::from(
        "<symbols><files><file id=\"1\" name=\"bench.cs\"/></files><methods>",
    );
    let _ = write!(xml, "<method token=\"0x{:08x}\"><sequencePoints>", METHOD.0);

    for (line, instruction) in body.instructions.iter().step_by(4).enumerate() {
        let line = line + 1;
        let _ = writeln!(source, "        Console.WriteLine(\"Hello\");");
        if line % 5 == 0 {
            let _ = write!(xml, "<entry offset=\"0x{:x}\" hidden=\"true\"/>", instruction.offset);
        } else {
            let _ = write!(
                xml,
                "<entry offset=\"0x{:x}\" startLine=\"{line}\" startColumn=\"9\" endLine=\"{line}\" endColumn=\"37\" document=\"1\"/>",
                instruction.offset
            );
        }
    }
    xml.push_str("</sequencePoints></method></methods></symbols>");

    let document = DebugDocument::parse(&xml).unwrap();
    let sources = [SourceText::new(source).with_path("bench.cs")];
    SequencePointMarkers::for_method(&document, METHOD, &sources).unwrap()
}

fn bench_pseudo_plain(c: &mut Criterion) {
    let body = body(512);

    c.bench_function("pseudo_plain_512", |b| {
        b.iter(|| {
            let listing = pseudo::render(black_box(&body), None, SequencePointDetail::None);
            black_box(listing)
        });
    });
}

fn bench_pseudo_basic_markers(c: &mut Criterion) {
    let body = body(512);
    let markers = markers(&body);

    c.bench_function("pseudo_basic_512", |b| {
        b.iter(|| {
            let listing = pseudo::render(
                black_box(&body),
                Some(&markers),
                SequencePointDetail::Basic,
            );
            black_box(listing)
        });
    });
}

fn bench_pseudo_enhanced_markers(c: &mut Criterion) {
    let body = body(512);
    let markers = markers(&body);

    c.bench_function("pseudo_enhanced_512", |b| {
        b.iter(|| {
            let listing = pseudo::render(
                black_box(&body),
                Some(&markers),
                SequencePointDetail::Enhanced,
            );
            black_box(listing)
        });
    });
}

fn bench_annotate_listing(c: &mut Criterion) {
    let body = body(512);
    let markers = markers(&body);
    let listing = pseudo::render(&body, None, SequencePointDetail::None);

    c.bench_function("annotate_listing_512", |b| {
        b.iter(|| {
            let annotated =
                annotate_listing(black_box(&listing), &markers, SequencePointDetail::Basic);
            black_box(annotated)
        });
    });
}

fn bench_debug_document_parse(c: &mut Criterion) {
    let body = body(512);
    let mut xml = String::from("<symbols><methods>");
    let _ = write!(xml, "<method token=\"0x{:08x}\"><sequencePoints>", METHOD.0);
    for (line, instruction) in body.instructions.iter().enumerate() {
        let _ = write!(
            xml,
            "<entry offset=\"0x{:x}\" startLine=\"{}\" startColumn=\"1\" endLine=\"{}\" endColumn=\"10\"/>",
            instruction.offset,
            line + 1,
            line + 1
        );
    }
    xml.push_str("</sequencePoints></method></methods></symbols>");

    c.bench_function("debug_document_parse_513", |b| {
        b.iter(|| {
            let document = DebugDocument::parse(black_box(&xml)).unwrap();
            black_box(document)
        });
    });
}

criterion_group!(
    benches,
    bench_pseudo_plain,
    bench_pseudo_basic_markers,
    bench_pseudo_enhanced_markers,
    bench_annotate_listing,
    bench_debug_document_parse
);
criterion_main!(benches);
