use criterion::{black_box, criterion_group, criterion_main, Criterion};
use html_to_image::{
    build_command, interpret, resolve_format, CommandLine, ExecutionResult, ImageOptions,
    PosixQuoting, WindowsQuoting,
};
use std::path::Path;
use std::time::Duration;

#[cfg(all(feature = "wkhtmltoimage_tests", unix))]
use html_to_image::{render, RendererConfig};
#[cfg(all(feature = "wkhtmltoimage_tests", unix))]
use tokio::runtime::Runtime;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn full_options() -> ImageOptions {
    ImageOptions::new()
        .with("crop-w", 100)
        .with("crop-h", 200)
        .with("crop-x", 300)
        .with("crop-y", 400)
        .with("width", 500)
        .with("height", 600)
        .with("format", "png")
        .with("quality", 50)
        .with("zoom", 1.5)
        .with("javascript-delay", 200)
}

// === UNIT BENCHMARKS ===

fn benchmark_command_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("command");
    configure_fast_group(&mut group);

    let options = full_options();
    let binary = Path::new("/bin/sh");

    group.bench_function("build", |b| {
        b.iter(|| {
            let command = build_command(black_box(binary), black_box(&options));
            let _ = black_box(command);
        });
    });

    group.finish();
}

fn benchmark_quoting(c: &mut Criterion) {
    let mut group = c.benchmark_group("quoting");
    configure_fast_group(&mut group);

    let command = CommandLine::new("/usr/bin/wkhtmltoimage")
        .flag("format")
        .value("it's a png")
        .flag("zoom")
        .value("1.5")
        .flag("quiet")
        .stdio()
        .stdio();

    group.bench_function("posix", |b| {
        b.iter(|| black_box(command.render(&PosixQuoting)));
    });

    group.bench_function("windows", |b| {
        b.iter(|| black_box(command.render(&WindowsQuoting)));
    });

    group.finish();
}

fn benchmark_format_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_resolution");
    configure_fast_group(&mut group);

    group.bench_function("fallback_to_extension", |b| {
        b.iter(|| {
            let mut options = ImageOptions::new().with("width", 500);
            let format = resolve_format(&mut options, black_box(Some("png")));
            let _ = black_box(format);
        });
    });

    group.finish();
}

fn benchmark_interpretation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret");
    configure_fast_group(&mut group);

    let image = vec![0u8; 256 * 1024];

    group.bench_function("success_256k", |b| {
        b.iter(|| {
            let result = ExecutionResult {
                stdout: image.clone(),
                ..Default::default()
            };
            let _ = black_box(interpret(result, "/usr/bin/wkhtmltoimage --quiet - -"));
        });
    });

    group.finish();
}

// === INTEGRATION BENCHMARKS (require wkhtmltoimage) ===

#[cfg(all(feature = "wkhtmltoimage_tests", unix))]
fn benchmark_real_render(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("wkhtmltoimage");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let config = RendererConfig {
        image_options: ImageOptions::new().with("width", 320).with("format", "png"),
        ..Default::default()
    };

    group.bench_function("small_page", |b| {
        b.iter(|| {
            rt.block_on(async {
                let data = render("<h1>Benchmark</h1>", &config).await;
                let _ = black_box(data);
            })
        });
    });

    group.finish();
}

// === BENCHMARK GROUPS ===

criterion_group!(
    unit_benches,
    benchmark_command_building,
    benchmark_quoting,
    benchmark_format_resolution,
    benchmark_interpretation,
);

#[cfg(all(feature = "wkhtmltoimage_tests", unix))]
criterion_group!(integration_benches, benchmark_real_render);

#[cfg(all(feature = "wkhtmltoimage_tests", unix))]
criterion_main!(unit_benches, integration_benches);

#[cfg(not(all(feature = "wkhtmltoimage_tests", unix)))]
criterion_main!(unit_benches);
