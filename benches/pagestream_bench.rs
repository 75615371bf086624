use criterion::{criterion_group, criterion_main, Criterion};
use pagestream::OutputStream;

fn bench_in_memory_writes(c: &mut Criterion) {
    c.bench_function("in_memory_sequential_writes", |b| {
        b.iter(|| {
            let mut stream = OutputStream::new_in_memory(4096);
            for _ in 0..1000 {
                stream.write(b"some moderately sized event payload\n").unwrap();
            }
            stream.get_output()
        });
    });
}

fn bench_file_backed_writes(c: &mut Criterion) {
    let dir = std::env::temp_dir().join(format!("pagestream-bench-{}", std::process::id()));
    let path = dir.join("out.bin");

    c.bench_function("file_backed_sequential_writes", |b| {
        b.iter(|| {
            let mut stream = OutputStream::new_file(&path, 256 * 1024).unwrap();
            for _ in 0..1000 {
                stream.write(b"some moderately sized event payload\n").unwrap();
            }
            stream.close_sync().unwrap();
        });
    });

    let _ = std::fs::remove_dir_all(&dir);
}

fn bench_delayed_fixed_reservation(c: &mut Criterion) {
    c.bench_function("delayed_fixed_reservation", |b| {
        b.iter(|| {
            let mut stream = OutputStream::new_in_memory(4096);
            for i in 0u64..500 {
                let cursor = stream.reserve_fixed(8);
                stream.write(b"payload between reservation and its fill-in").unwrap();
                stream.finalize_fixed(cursor, &i.to_le_bytes());
            }
            stream.get_output()
        });
    });
}

criterion_group!(
    benches,
    bench_in_memory_writes,
    bench_file_backed_writes,
    bench_delayed_fixed_reservation
);
criterion_main!(benches);
