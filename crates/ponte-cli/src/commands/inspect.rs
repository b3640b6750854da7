//! `ponte inspect`: check a native library for the exports the bridge
//! resolves during the handshake.

use std::path::Path;

use anyhow::bail;
use ponte_bridge::exports::{expected_exports, optional_exports};
use ponte_bridge::Library;

/// Which expected exports a library provides
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Exports found, in handshake order
    pub present: Vec<&'static str>,
    /// Exports missing, in handshake order
    pub missing: Vec<&'static str>,
    /// Optional exports the library leaves out
    pub optional_missing: Vec<&'static str>,
}

impl ExportReport {
    /// Check whether the handshake can complete
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check every expected export against `has_symbol`
pub fn check_exports(has_symbol: impl Fn(&str) -> bool) -> ExportReport {
    let mut report = ExportReport::default();
    for name in expected_exports() {
        if has_symbol(name) {
            report.present.push(name);
        } else {
            report.missing.push(name);
        }
    }
    report.optional_missing = optional_exports()
        .into_iter()
        .filter(|name| !has_symbol(*name))
        .collect();
    report
}

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let library = Library::open(path)?;
    let report = check_exports(|symbol| library.has_symbol(symbol));
    let name = library.path().to_string();
    if !library.close() {
        log::warn!("Something went wrong unloading {}", name);
    }

    println!("Library: {}", name);
    for export in expected_exports() {
        let mark = if report.missing.contains(&export) { "missing" } else { "ok" };
        println!("  {:<28} {}", export, mark);
    }
    for export in optional_exports() {
        let mark = if report.optional_missing.contains(&export) {
            "absent (optional)"
        } else {
            "ok"
        };
        println!("  {:<28} {}", export, mark);
    }

    if !report.is_complete() {
        bail!(
            "{} of {} exports missing; the handshake would abort",
            report.missing.len(),
            report.present.len() + report.missing.len()
        );
    }
    println!("All {} exports present", report.present.len());
    Ok(())
}
