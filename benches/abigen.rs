//! Benchmarks for ABI generation.
//!
//! Tests performance of the individual pipeline stages on a synthetic module:
//! - Class file reading
//! - Class file serialization
//! - Global marking
//! - The full pipeline, sequential and parallel

extern crate abiscope;

use abiscope::{
    abi::{mark::Marking, serialize::write_unit},
    classfile::{
        builder::{ClassBuilder, CodeBuilder},
        flags::{FieldAccessFlags, MethodAccessFlags},
        opcodes, read_unit, DeclarationUnit, Member,
    },
    AbiGenConfig, AbiGenerator, Module, ModuleSource,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// A class with public API, private implementation and one inline function.
fn synthetic_unit(index: usize) -> DeclarationUnit {
    let name = format!("bench/pkg{}/Service{index}", index % 8);
    let mut builder = ClassBuilder::new(name.clone())
        .source_file(format!("Service{index}.kt"))
        .field(Member::field(FieldAccessFlags::PRIVATE, "state", "I"));

    for method in 0..24 {
        let access = if method % 3 == 0 {
            MethodAccessFlags::PRIVATE
        } else {
            MethodAccessFlags::PUBLIC
        };
        let body = CodeBuilder::new()
            .line(method as u16 + 1)
            .aload(0)
            .getfield(&name, "state", "I")
            .iconst(method as i32)
            .op(0x60) // iadd
            .op(opcodes::IRETURN)
            .build();
        builder = builder.method(Member::method(access, format!("m{method}"), "()I").with_body(body));
    }

    let inline = Member {
        inline: true,
        ..Member::method(MethodAccessFlags::PUBLIC, "fast", "()I").with_body(
            CodeBuilder::new()
                .aload(0)
                .invokevirtual(&name, "m0", "()I")
                .op(opcodes::IRETURN)
                .build(),
        )
    };
    builder.method(inline).build()
}

fn synthetic_source(count: usize) -> ModuleSource {
    let mut source = ModuleSource::new();
    for index in 0..count {
        let unit = synthetic_unit(index);
        let name = unit.file_name();
        source.add_container(name, ClassBuilder::from_unit(unit).to_bytes().unwrap());
    }
    source
}

/// Benchmark decoding one class file.
fn bench_read_unit(c: &mut Criterion) {
    let bytes = write_unit(&synthetic_unit(0)).unwrap();

    c.bench_function("abigen_read_unit", |b| {
        b.iter(|| {
            let unit = read_unit(black_box(&bytes)).unwrap();
            black_box(unit)
        });
    });
}

/// Benchmark encoding one class file, including constant pool construction.
fn bench_write_unit(c: &mut Criterion) {
    let unit = synthetic_unit(0);

    c.bench_function("abigen_write_unit", |b| {
        b.iter(|| {
            let bytes = write_unit(black_box(&unit)).unwrap();
            black_box(bytes)
        });
    });
}

/// Benchmark the global mark phase over 256 units.
fn bench_marking(c: &mut Criterion) {
    let module = Module::from_units((0..256).map(synthetic_unit)).unwrap();

    c.bench_function("abigen_marking_256", |b| {
        b.iter(|| {
            let marking = Marking::compute(black_box(&module)).unwrap();
            black_box(marking)
        });
    });
}

/// Benchmark the whole pipeline over 256 units.
fn bench_generate(c: &mut Criterion) {
    let source = synthetic_source(256);
    let parallel = AbiGenerator::default();
    let sequential = AbiGenerator::new(AbiGenConfig::default().with_parallel(false));

    c.bench_function("abigen_generate_256_parallel", |b| {
        b.iter(|| {
            let artifact = parallel.generate(black_box(&source)).unwrap();
            black_box(artifact)
        });
    });

    c.bench_function("abigen_generate_256_sequential", |b| {
        b.iter(|| {
            let artifact = sequential.generate(black_box(&source)).unwrap();
            black_box(artifact)
        });
    });
}

criterion_group!(
    benches,
    bench_read_unit,
    bench_write_unit,
    bench_marking,
    bench_generate
);
criterion_main!(benches);
