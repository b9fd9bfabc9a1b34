use cascade_detector::cascade::Cascade;
use cascade_detector::config::detect::{self, CascadeFormat};
use cascade_detector::diagnostics::DetectionReport;
use cascade_detector::image::io::{load_grayscale_image, write_json_file};
use cascade_detector::FaceDetector;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = detect::load_config(Path::new(&config_path))?;

    let bytes = fs::read(&config.cascade)
        .map_err(|e| format!("Failed to read cascade {}: {e}", config.cascade.display()))?;
    let cascade = match config.cascade_format {
        CascadeFormat::Native => Cascade::from_bytes(&bytes),
        CascadeFormat::Pico => Cascade::from_pico_bytes(&bytes),
    }
    .map_err(|e| format!("Failed to load cascade {}: {e}", config.cascade.display()))?;

    let mut gray = load_grayscale_image(&config.input)?;
    if let Some(ldim) = config.ldim {
        gray = gray.with_ldim(ldim);
    }
    let image = gray.as_view().map_err(|e| e.to_string())?;

    let detector = FaceDetector::new(cascade, config.detector.clone()).map_err(|e| e.to_string())?;
    let report = detector.detect(&image);

    print_text_summary(&config.input, &report);
    if let Some(path) = &config.output.json_out {
        write_json_file(path, &report)?;
        println!("JSON report written to {}", path.display());
    }
    Ok(())
}

fn print_text_summary(input: &Path, report: &DetectionReport) {
    println!(
        "{} ({}x{}, ldim {}): {} windows, {} raw, {} clusters, {} detections in {:.3} ms",
        input.display(),
        report.input.ncols,
        report.input.nrows,
        report.input.ldim,
        report.windows,
        report.raw_count,
        report.cluster_count,
        report.detections.len(),
        report.timing.total_ms
    );
    for d in &report.detections {
        println!(
            "  x={:.1} y={:.1} w={:.1} h={:.1} score={:.2} support={}",
            d.bbox.x, d.bbox.y, d.bbox.w, d.bbox.h, d.detection.score, d.support
        );
    }
}

fn usage() -> String {
    "Usage: detect_faces <config.json>".to_string()
}
