//! Prominence-based peak detection.
//!
//! A peak is a local maximum (flat tops report their middle sample) whose
//! prominence reaches the threshold. Prominence is the peak height above the
//! higher of the two minima found by walking left and right from the peak
//! until a strictly higher sample or the trace edge.
//!
//! Peaks are searched per channel group and region; an optional trailing
//! window turns the indicator into a rolling peak count.
use crate::config::PipelineConfig;
use crate::error::{FphotError, Result};
use crate::table::SignalTable;

/// Indices of local maxima. Plateaus yield their midpoint (rounded down).
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut out = vec![];
    if n < 3 {
        return out;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                out.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    out
}

/// Prominence of each peak in `peaks`.
pub fn prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&p| {
            let h = x[p];
            let mut left_min = h;
            let mut i = p;
            loop {
                if x[i] > h {
                    break;
                }
                left_min = left_min.min(x[i]);
                if i == 0 {
                    break;
                }
                i -= 1;
            }
            let mut right_min = h;
            for &v in &x[p..] {
                if v > h {
                    break;
                }
                right_min = right_min.min(v);
            }
            h - left_min.max(right_min)
        })
        .collect()
}

/// Peaks with prominence `>= min_prominence`.
pub fn find_peaks(x: &[f64], min_prominence: f64) -> Vec<usize> {
    let cands = local_maxima(x);
    let prom = prominences(x, &cands);
    cands
        .into_iter()
        .zip(prom)
        .filter(|&(_, p)| p >= min_prominence)
        .map(|(i, _)| i)
        .collect()
}

/// Trailing-window sum; `NaN` until the window is full.
pub fn rolling_sum(data: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(FphotError::configuration("peak frequency window must be at least 1"));
    }
    let n = data.len();
    let mut out = vec![f64::NAN; n];
    let mut acc = 0.0;
    for i in 0..n {
        acc += data[i];
        if i >= window {
            acc -= data[i - window];
        }
        if i + 1 >= window {
            out[i] = acc;
        }
    }
    Ok(out)
}

/// Peak columns for one region, aligned to the rows of [`PeakTable::table`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPeaks {
    pub region: String,
    /// `None` on rows outside the searched channels.
    pub is_peak: Vec<Option<bool>>,
    /// Rolling peak count; `NaN` outside searched channels and while the
    /// window fills. Present only when a window width was given.
    pub frequency: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeakTable {
    pub table: SignalTable,
    pub regions: Vec<RegionPeaks>,
}

impl PeakTable {
    pub fn region(&self, region: &str) -> Option<&RegionPeaks> {
        self.regions.iter().find(|r| r.region == region)
    }

    /// Row indices flagged as peaks for `region`.
    pub fn peak_rows(&self, region: &str) -> Vec<usize> {
        self.region(region)
            .map(|r| {
                r.is_peak
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| **p == Some(true))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Run the detector with prominence, window and channel filter from `cfg`.
pub fn detect(data: &SignalTable, cfg: &PipelineConfig) -> Result<PeakTable> {
    let regions = cfg.regions()?;
    find_pks(
        data,
        &regions,
        cfg.peak_prominence()?,
        cfg.peak_window,
        cfg.peak_channels.as_deref(),
    )
}

/// Flag peaks per region in the selected channel groups (all groups when
/// `channels` is `None`).
pub fn find_pks(
    data: &SignalTable,
    regions: &[String],
    prominence: f64,
    freq_window: Option<usize>,
    channels: Option<&[String]>,
) -> Result<PeakTable> {
    let n = data.n_rows();
    let mut out = Vec::with_capacity(regions.len());
    for region in regions {
        let col = data
            .region_index(region)
            .ok_or_else(|| FphotError::MissingColumn(region.clone()))?;
        let mut is_peak = vec![None; n];
        let mut frequency = freq_window.map(|_| vec![f64::NAN; n]);

        for signal in data.signals() {
            if channels.is_some_and(|c| !c.contains(&signal)) {
                continue;
            }
            let rows = data.rows_of(&signal);
            let trace: Vec<f64> = rows.iter().map(|&r| data.values[[r, col]]).collect();
            let mut flags = vec![false; rows.len()];
            for p in find_peaks(&trace, prominence) {
                flags[p] = true;
            }
            for (k, &r) in rows.iter().enumerate() {
                is_peak[r] = Some(flags[k]);
            }
            if let (Some(w), Some(freq)) = (freq_window, frequency.as_mut()) {
                let ind: Vec<f64> = flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
                for (k, v) in rolling_sum(&ind, w)?.into_iter().enumerate() {
                    freq[rows[k]] = v;
                }
            }
        }

        out.push(RegionPeaks {
            region: region.clone(),
            is_peak,
            frequency,
        });
    }
    Ok(PeakTable {
        table: data.clone(),
        regions: out,
    })
}

/// Label contiguous runs of `true` as 1, 2, 3, … and everything else 0.
pub fn label_bouts(active: &[bool]) -> (Vec<usize>, usize) {
    let mut labels = vec![0; active.len()];
    let mut n = 0;
    for (i, &a) in active.iter().enumerate() {
        if a {
            if i == 0 || !active[i - 1] {
                n += 1;
            }
            labels[i] = n;
        }
    }
    (labels, n)
}
