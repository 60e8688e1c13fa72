use melody::{Mode, Note, TonalKey};
use serde::{Deserialize, Serialize};

/// Scale-degree weights for major keys, tonic first. Tonic and dominant
/// lead, then the third, fourth, second, sixth and seventh. Chromatic
/// degrees sit near zero.
const MAJOR_PROFILE: [f64; 12] = [5.0, 0.1, 2.0, 0.1, 3.0, 2.5, 0.1, 4.5, 0.1, 2.0, 0.1, 1.5];

/// Natural minor weights, with a small allowance for the raised seventh.
const MINOR_PROFILE: [f64; 12] = [5.0, 0.1, 2.0, 3.0, 0.1, 2.5, 0.1, 4.5, 2.0, 0.1, 1.5, 1.0];

const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyDetection {
    pub key: TonalKey,
    /// Pearson correlation with the winning profile
    pub confidence: f64,
}

/// Guesses the tonal center of a note list.
///
/// Detection never fails: an empty or silent list yields C major with
/// zero confidence.
pub trait KeyDetector: Send + Sync {
    fn detect(&self, notes: &[Note]) -> KeyDetection;
}

/// Correlates a duration-weighted pitch-class histogram against a major
/// and a minor profile rotated to all twelve tonics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileKeyDetector {
    pub major: [f64; 12],
    pub minor: [f64; 12],
}

impl Default for ProfileKeyDetector {
    fn default() -> Self {
        ProfileKeyDetector {
            major: MAJOR_PROFILE,
            minor: MINOR_PROFILE,
        }
    }
}

struct Candidate {
    key: TonalKey,
    correlation: f64,
    out_of_scale: usize,
}

impl KeyDetector for ProfileKeyDetector {
    fn detect(&self, notes: &[Note]) -> KeyDetection {
        let fallback = KeyDetection {
            key: TonalKey::major(0),
            confidence: 0.0,
        };

        let histogram = pitch_class_histogram(notes);
        if histogram.iter().sum::<f64>() <= 0.0 {
            return fallback;
        }

        let mut best: Option<Candidate> = None;
        for tonic in 0..12u8 {
            let mut rotated = [0.0; 12];
            for (i, slot) in rotated.iter_mut().enumerate() {
                *slot = histogram[(i + tonic as usize) % 12];
            }

            for (mode, profile) in [(Mode::Major, &self.major), (Mode::Minor, &self.minor)] {
                let key = TonalKey::new(tonic, mode);
                let candidate = Candidate {
                    key,
                    correlation: pearson(&rotated, profile),
                    out_of_scale: notes.iter().filter(|n| !key.contains(n.pitch % 12)).count(),
                };
                // Earlier candidates win exact ties: lower tonic, major first
                let better = match &best {
                    None => true,
                    Some(current) => {
                        candidate.correlation > current.correlation + TIE_EPSILON
                            || ((candidate.correlation - current.correlation).abs() <= TIE_EPSILON
                                && candidate.out_of_scale < current.out_of_scale)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(winner) => KeyDetection {
                key: winner.key,
                confidence: winner.correlation,
            },
            None => fallback,
        }
    }
}

/// Detect a key with the default profiles.
pub fn detect_key(notes: &[Note]) -> TonalKey {
    ProfileKeyDetector::default().detect(notes).key
}

/// Total duration per pitch class.
pub fn pitch_class_histogram(notes: &[Note]) -> [f64; 12] {
    let mut histogram = [0.0_f64; 12];
    for note in notes {
        if note.duration.is_finite() && note.duration > 0.0 {
            histogram[(note.pitch % 12) as usize] += note.duration;
        }
    }
    histogram
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}
