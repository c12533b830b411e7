// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use colored::*;
use std::time::Duration;

use crate::features::Feature;
use crate::geometry::Mesh;
use crate::recognition::AnalysisReport;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Report a finished analysis
    pub fn report_analysis(source: &str, report: &AnalysisReport) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "Part:".bold(), source.cyan());
        println!("{}", "━".repeat(80).bright_black());

        if report.features.is_empty() {
            println!(
                "{} {}",
                "✅".green(),
                "No machining features above threshold".green().bold()
            );
        } else {
            println!(
                "{} {}",
                "✅".green(),
                format!("{} features recognized", report.feature_count())
                    .green()
                    .bold()
            );
        }

        println!("\n{}", "Mesh:".bold());
        Self::print_field("Faces", &report.face_count.to_string());
        if report.skipped_degenerate > 0 {
            Self::print_field("Degenerate", &report.skipped_degenerate.to_string().yellow());
        }
        Self::print_field("Surfaces", &report.surface_count.to_string());
        Self::print_field("Noise faces", &report.noise_face_count.to_string());
        Self::print_field("Edges", &report.edge_count.to_string());
        Self::print_field("Min size", &format!("{:.2} mm", report.min_feature_size));

        if !report.features.is_empty() {
            println!("\n{}", "Features:".bold());
            for feature in &report.features {
                Self::print_feature(feature);
            }

            let stats = &report.statistics;
            println!("\n{}", "Summary:".bold());
            for (kind, count) in &stats.counts {
                Self::print_field(kind.as_str(), &count.to_string());
            }
            Self::print_field("Avg conf.", &format!("{:.2}", stats.average_confidence));
            Self::print_field("Removed", &format!("{:.1} mm³", stats.removed_volume));
            Self::print_field(
                "Machining",
                &format!("{:.1} min", stats.estimated_machining_minutes),
            );
        }

        println!("\n{}", "Performance:".bold());
        for timing in &report.timings {
            Self::print_field(
                timing.stage.as_str(),
                &Self::format_duration(Duration::from_secs_f64(timing.millis / 1000.0)).yellow(),
            );
        }
        Self::print_field(
            "Total",
            &Self::format_duration(Duration::from_secs_f64(report.total_millis() / 1000.0)).cyan(),
        );
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report mesh statistics without running detection
    pub fn report_mesh(source: &str, mesh: &Mesh, boundary_edges: usize, duration: Duration) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "Mesh:".bold(), source.cyan());
        println!("{}", "━".repeat(80).bright_black());
        let bounds = mesh.bounds();
        let size = bounds.size();
        Self::print_field("Vertices", &mesh.vertex_count().to_string());
        Self::print_field("Faces", &mesh.face_count().to_string());
        Self::print_field("Degenerate", &mesh.skipped_degenerate().to_string());
        Self::print_field(
            "Size",
            &format!("{:.2} x {:.2} x {:.2} mm", size.x, size.y, size.z),
        );
        Self::print_field("Weld tol.", &format!("{:.2e} mm", mesh.weld_tolerance()));
        if boundary_edges == 0 {
            Self::print_field("Closed", &"yes".green());
        } else {
            Self::print_field("Closed", &format!("no ({} open edges)", boundary_edges).yellow());
        }
        Self::print_field("Time", &Self::format_duration(duration).yellow());
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }

    fn print_feature(feature: &Feature) {
        let dims = feature
            .dimensions
            .iter()
            .map(|(name, value)| format!("{}={:.2}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        let children = match &feature.compound {
            Some(compound) => format!(" +{} nested", compound.children.len()),
            None => String::new(),
        };
        println!(
            "  {} {:<12} {} {}{}",
            feature.id.to_string().bright_black(),
            feature.kind.as_str().cyan(),
            Self::color_confidence(feature.confidence),
            dims,
            children.bright_black()
        );
    }

    fn print_field(name: &str, value: &dyn std::fmt::Display) {
        println!("  {} {}", format!("{:<12}", format!("{}:", name)).bright_black(), value);
    }

    /// Confidence colored by band
    fn color_confidence(confidence: f64) -> ColoredString {
        let text = format!("{:.2}", confidence);
        if confidence >= 0.8 {
            text.green()
        } else if confidence >= 0.6 {
            text.yellow()
        } else {
            text.red()
        }
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }

    #[test]
    fn test_confidence_bands() {
        colored::control::set_override(false);
        assert_eq!(Reporter::color_confidence(0.95).to_string(), "0.95");
        assert_eq!(Reporter::color_confidence(0.612).to_string(), "0.61");
    }
}
