//! Summary output for a finished run

use ackrgd_convert::ServiceOutput;
use console::style;

pub fn print_summary(outputs: &[ServiceOutput]) {
    println!();
    for output in outputs {
        println!(
            "  {} {}",
            style("✓").green().bold(),
            style(&output.service).bold()
        );
        println!(
            "    {} {} ({} CRD{})",
            style("crds").dim(),
            output.crd_graph.display(),
            output.counts.crds,
            if output.counts.crds == 1 { "" } else { "s" }
        );
        println!(
            "    {} {} ({} resources, {} gated, {} override{})",
            style("ctrl").dim(),
            output.controller_graph.display(),
            output.counts.controller_resources,
            output.counts.gated,
            output.counts.overrides,
            if output.counts.overrides == 1 { "" } else { "s" }
        );
        if let Some(path) = &output.defaults_example {
            println!("    {} {}", style("defaults").dim(), path.display());
        }
    }

    println!();
    println!(
        "  {} service{} generated",
        style(outputs.len()).green().bold(),
        if outputs.len() == 1 { "" } else { "s" }
    );
}
