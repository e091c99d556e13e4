//! Rendition ladder (§3): the fixed set of output heights/bitrates and the
//! bandwidth-interpolation formula used to rate an arbitrary source height.

/// One rung of the fixed rendition ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    pub height: u32,
    pub default_rate_kbps: u32,
    pub required: bool,
}

/// Ladder used for multi-bitrate expansion, ordered by ascending height.
pub const DEFAULT_RENDITIONS: &[Rendition] = &[
    Rendition { height: 240, default_rate_kbps: 500, required: true },
    Rendition { height: 360, default_rate_kbps: 1000, required: true },
    Rendition { height: 480, default_rate_kbps: 2500, required: false },
    Rendition { height: 720, default_rate_kbps: 5000, required: false },
    Rendition { height: 1080, default_rate_kbps: 8000, required: false },
];

/// Bandwidth (kbps) for an arbitrary target height `h`, via linear
/// interpolation between the ladder rungs bracketing it (§4.2).
pub fn rate_for_height(h: u32) -> u32 {
    for (i, rung) in DEFAULT_RENDITIONS.iter().enumerate() {
        if h <= rung.height {
            let (h_lower, b_lower) = if i == 0 {
                (0, 0)
            } else {
                (DEFAULT_RENDITIONS[i - 1].height, DEFAULT_RENDITIONS[i - 1].default_rate_kbps)
            };
            return adapt_rate(h, h_lower, rung.height, b_lower, rung.default_rate_kbps);
        }
    }
    DEFAULT_RENDITIONS.last().unwrap().default_rate_kbps
}

fn adapt_rate(h: u32, h_lower: u32, h_upper: u32, b_lower: u32, b_upper: u32) -> u32 {
    if h == h_lower {
        return b_lower;
    }
    if h == h_upper {
        return b_upper;
    }
    let frac = (h - h_lower) as f64 / (h_upper - h_lower) as f64;
    (frac * (b_upper - b_lower) as f64) as u32 + b_lower
}

/// The ladder rung immediately above `height`, if any (used to decide
/// whether an augmenting rung at the source height is "close enough" to
/// the next-below step to be dropped).
fn next_rendition_above(height: u32) -> Option<Rendition> {
    DEFAULT_RENDITIONS.iter().copied().find(|r| height < r.height)
}

/// Build the ladder subset to encode for a source of height `source_height`
/// under multi-bitrate mode (§3 "Rendition ladder"): every default rung with
/// `height <= source_height`, clamped at the ladder top, plus (usually) an
/// extra rung at the source height itself.
pub fn renditions_for(source_height: u32) -> Vec<Rendition> {
    let clamped = source_height.min(DEFAULT_RENDITIONS.last().unwrap().height);

    let mut rungs: Vec<Rendition> = DEFAULT_RENDITIONS
        .iter()
        .copied()
        .filter(|r| clamped >= r.height)
        .collect();

    if rungs.is_empty() {
        return vec![Rendition {
            height: clamped,
            default_rate_kbps: rate_for_height(clamped),
            required: false,
        }];
    }

    let top = *rungs.last().unwrap();
    if top.height < clamped {
        if let Some(next) = next_rendition_above(clamped) {
            let fraction =
                (clamped - top.height) as f64 / (next.height - top.height) as f64;
            if !top.required && fraction < 0.3 {
                rungs.pop();
            }
        }
        rungs.push(Rendition {
            height: clamped,
            default_rate_kbps: rate_for_height(clamped),
            required: false,
        });
    }

    rungs
}
