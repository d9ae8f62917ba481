//! Formatted terminal output.
//!
//! Formatting lives here so the fit code stays free of presentation concerns
//! and output changes stay localized.

use crate::domain::{DiTauSolution, FitConfig, LegSolution};
use crate::fit::ParameterTable;
use crate::math::AsymmetricError;

/// Header plus one block per candidate.
pub fn format_run_summary(event: u64, per_candidate: &[Vec<DiTauSolution>], config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} - di-tau reconstruction ===\n", config.name));
    out.push_str(&format!("Event: {event}\n"));
    out.push_str(&format!(
        "Terms: {} | samplings={} | strategy={} | max_iter={}\n",
        config
            .likelihoods
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        config.num_samplings,
        config.strategy,
        config.max_iterations,
    ));

    for (i, solutions) in per_candidate.iter().enumerate() {
        out.push_str(&format!("\nCandidate {i}: {} solution(s)\n", solutions.len()));
        out.push_str(&format_solutions_table(solutions));
        for s in solutions {
            out.push_str(&format_breakdown(s));
        }
    }

    out
}

/// One row per solution, in enumeration order.
pub fn format_solutions_table(solutions: &[DiTauSolution]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<4} {:>10} {:>20} {:>8} {:>8} {:>7} {:>5} {:>12}\n",
            "hyp", "mass", "mass err (+/-)", "x1", "x2", "status", "free", "objective"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<10} {:-<20} {:-<8} {:-<8} {:-<7} {:-<5} {:-<12}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for s in solutions {
        let (p1, p2) = s.polarizations();
        out.push_str(
            format!(
                "{:<4} {:>10.3} {:>20} {:>8} {:>8} {:>7} {:>5} {:>12.4}\n",
                format!("{}{}", p1.short(), p2.short()),
                s.mass(),
                fmt_error(s.mass_error.as_ref()),
                fmt_x(&s.leg1),
                fmt_x(&s.leg2),
                s.fit_status,
                s.n_free,
                s.min_objective,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn format_breakdown(s: &DiTauSolution) -> String {
    let (p1, p2) = s.polarizations();
    let parts: Vec<String> = s
        .log_likelihoods
        .iter()
        .map(|(name, v)| format!("{name}={v:.4}"))
        .collect();
    format!("  {}{}: {}\n", p1.short(), p2.short(), parts.join(" "))
}

/// Parameter layout with start values, steps, bounds and lock state.
pub fn format_parameter_table(table: &ParameterTable) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>3} {:<20} {:>12} {:>12} {:>26} {:<6}\n",
            "idx", "name", "start", "step", "bounds", "state"
        )
        .trim_end(),
    );
    out.push('\n');

    for p in table.iter() {
        let bounds = match p.bounds {
            Some((lo, hi)) => format!("[{lo:.4}, {hi:.4}]"),
            None => "unbounded".to_string(),
        };
        out.push_str(
            format!(
                "{:>3} {:<20} {:>12.5} {:>12.5} {:>26} {:<6}\n",
                p.index,
                p.name,
                p.start,
                p.step,
                bounds,
                if p.is_fixed { "fixed" } else { "free" },
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!("free={} fixed={}\n", table.n_free(), table.n_fixed()));
    out
}

fn fmt_error(e: Option<&AsymmetricError>) -> String {
    match e {
        Some(e) => format!("+{:.3} / -{:.3}", e.up, e.down),
        None => "-".to_string(),
    }
}

fn fmt_x(leg: &LegSolution) -> String {
    match &leg.x_error {
        Some(e) => format!("{:.3}~{:.2}", leg.x(), e.up.max(e.down)),
        None => format!("{:.4}", leg.x()),
    }
}
