//! Photobleach correction.
//!
//! For every `(region, channel)` target with a baseline assignment:
//!
//! 1. Fit a biexponential to the raw baseline trace (each distinct baseline
//!    is fitted once, however many targets share it).
//! 2. Regress the raw target on the fitted baseline with a Huber line and
//!    subtract the prediction → `<channel>-norm`.
//! 3. Z-score the residual → `<channel>-norm-zs`.
//!
//! The fitted baselines are emitted as `<channel>-fit` row groups. Region
//! columns a group does not cover are `NaN`. The input rows are returned
//! untouched at the head of the output table.
//!
//! Missing targets or baselines are skipped with a warning; a failed fit
//! falls back to the initial-guess curve with a warning.
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{BaselineMap, ChannelRef, PipelineConfig};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::fit::{fit_exp2, huber_fit, linspace01, Exp2Fit, FitStatus};
use crate::normalize::zscore;
use crate::table::SignalTable;

/// Output of [`photobleach_correction`].
#[derive(Debug, Clone)]
pub struct Corrected {
    pub table: SignalTable,
    /// Biexponential fit per baseline `(region, channel)`.
    pub fits: BTreeMap<ChannelRef, Exp2Fit>,
    pub diagnostics: Diagnostics,
}

/// Run the corrector with the baseline map and regions from `cfg`.
pub fn correct(data: &SignalTable, cfg: &PipelineConfig) -> Result<Corrected> {
    let baselines = cfg.baseline_map()?;
    let regions = cfg.regions()?;
    photobleach_correction(data, &baselines, &regions)
}

fn fit_label(channel: &str) -> String {
    format!("{channel}-fit")
}

fn norm_label(channel: &str) -> String {
    format!("{channel}-norm")
}

fn zs_label(channel: &str) -> String {
    format!("{channel}-norm-zs")
}

/// Debleach every target in `baselines` whose region is in `regions`.
pub fn photobleach_correction(
    data: &SignalTable,
    baselines: &BaselineMap,
    regions: &[String],
) -> Result<Corrected> {
    let mut diag = Diagnostics::new();

    // Resolve targets against what the table actually holds.
    let mut resolved: BTreeMap<&ChannelRef, &ChannelRef> = BTreeMap::new();
    for (target, base) in baselines {
        let Some(base) = base else { continue };
        if !regions.contains(&target.region) {
            continue;
        }
        if data.trace(&target.channel, &target.region).is_none() {
            diag.warn(Warning::MissingTarget {
                region: target.region.clone(),
                channel: target.channel.clone(),
            });
            continue;
        }
        if data.trace(&base.channel, &base.region).is_none() {
            diag.warn(Warning::MissingBaseline {
                region: target.region.clone(),
                channel: target.channel.clone(),
                base_region: base.region.clone(),
                base_channel: base.channel.clone(),
            });
            continue;
        }
        resolved.insert(target, base);
    }

    // Fit each distinct baseline once.
    let unique: BTreeSet<&ChannelRef> = resolved.values().copied().collect();
    let mut fits: BTreeMap<ChannelRef, Exp2Fit> = BTreeMap::new();
    let mut fit_groups: BTreeMap<String, SignalTable> = BTreeMap::new();
    for base in unique {
        let Some(y) = data.trace(&base.channel, &base.region) else { continue };
        let x = linspace01(y.len());
        let fit = fit_exp2(&y, &x);
        if let FitStatus::Failed(e) = &fit.status {
            diag.warn(Warning::FitFailed {
                region: base.region.clone(),
                channel: base.channel.clone(),
                reason: e.to_string(),
            });
        } else {
            log::debug!("fitted baseline {}/{}: {:?}", base.region, base.channel, fit.params);
        }
        let group = fit_groups
            .entry(base.channel.clone())
            .or_insert_with(|| data.blank_group(&base.channel, &fit_label(&base.channel)));
        group.set_column(&base.region, &fit.fitted)?;
        fits.insert(base.clone(), fit);
    }

    // Regress each target on its fitted baseline.
    let mut norm_groups: BTreeMap<String, (SignalTable, SignalTable)> = BTreeMap::new();
    for (target, base) in resolved {
        let (Some(raw), Some(fit)) = (data.trace(&target.channel, &target.region), fits.get(base))
        else {
            continue;
        };
        if raw.len() != fit.fitted.len() {
            diag.warn(Warning::TraceLengthMismatch {
                region: target.region.clone(),
                channel: target.channel.clone(),
                target_len: raw.len(),
                baseline_len: fit.fitted.len(),
            });
            continue;
        }
        let model = huber_fit(&fit.fitted, &raw);
        let norm: Vec<f64> = raw
            .iter()
            .zip(&fit.fitted)
            .map(|(&r, &b)| r - model.predict(b))
            .collect();
        let zs = zscore(&norm);

        let (norm_df, zs_df) = norm_groups.entry(target.channel.clone()).or_insert_with(|| {
            (
                data.blank_group(&target.channel, &norm_label(&target.channel)),
                data.blank_group(&target.channel, &zs_label(&target.channel)),
            )
        });
        norm_df.set_column(&target.region, &norm)?;
        zs_df.set_column(&target.region, &zs)?;
    }

    let mut parts = vec![data.clone()];
    parts.extend(fit_groups.into_values());
    for (norm_df, zs_df) in norm_groups.into_values() {
        parts.push(norm_df);
        parts.push(zs_df);
    }
    let table = SignalTable::concat(&parts)?;

    Ok(Corrected { table, fits, diagnostics: diag })
}

/// Output of [`compute_dff`].
#[derive(Debug, Clone)]
pub struct DffResult {
    pub table: SignalTable,
    pub diagnostics: Diagnostics,
}

/// ΔF/F against each trace's own biexponential fit.
///
/// Keeps only rows of `channels`, then appends `<channel>-fit` and
/// `<channel>-dff` groups where `dff = 100 · (raw − fit) / fit`.
pub fn compute_dff(data: &SignalTable, regions: &[String], channels: &[String]) -> Result<DffResult> {
    let mut diag = Diagnostics::new();
    let keep: Vec<usize> = (0..data.n_rows())
        .filter(|&r| channels.contains(&data.signal[r]))
        .collect();
    let base = data.take(&keep);

    let mut parts = vec![base.clone()];
    for channel in base.signals() {
        let mut fit_df = base.blank_group(&channel, &fit_label(&channel));
        let mut dff_df = base.blank_group(&channel, &format!("{channel}-dff"));
        for region in regions {
            let Some(y) = base.trace(&channel, region) else {
                diag.warn(Warning::MissingTarget {
                    region: region.clone(),
                    channel: channel.clone(),
                });
                continue;
            };
            let fit = fit_exp2(&y, &linspace01(y.len()));
            if let FitStatus::Failed(e) = &fit.status {
                diag.warn(Warning::FitFailed {
                    region: region.clone(),
                    channel: channel.clone(),
                    reason: e.to_string(),
                });
            }
            let dff: Vec<f64> = y
                .iter()
                .zip(&fit.fitted)
                .map(|(&v, &f)| 100.0 * (v - f) / f)
                .collect();
            fit_df.set_column(region, &fit.fitted)?;
            dff_df.set_column(region, &dff)?;
        }
        parts.push(fit_df);
        parts.push(dff_df);
    }

    Ok(DffResult {
        table: SignalTable::concat(&parts)?,
        diagnostics: diag,
    })
}
