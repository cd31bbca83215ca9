use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::filters::{
    ChannelMixOptions, DistortionOptions, EqualizerBand, FilterChainState, KaraokeOptions,
    LowPassOptions, RotationOptions, TimescaleOptions, TremoloOptions, VibratoOptions,
};

/// Niveles de bass boost (implementado con el filtro low-pass)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BassBoostLevel {
    Off,
    Low,
    #[default]
    Medium,
    High,
    Extreme,
}

impl BassBoostLevel {
    /// Suavizado del low-pass para cada nivel; `None` desactiva el slot.
    pub fn smoothing(&self) -> Option<f32> {
        match self {
            BassBoostLevel::Off => None,
            BassBoostLevel::Low => Some(10.0),
            BassBoostLevel::Medium => Some(15.0),
            BassBoostLevel::High => Some(20.0),
            BassBoostLevel::Extreme => Some(25.0),
        }
    }
}

/// Efecto solicitado por un comando.
///
/// Cada variante sabe en qué slot de [`FilterChainState`] escribe y cómo
/// acotar sus parámetros. Los valores fuera de rango se acotan en silencio;
/// nunca se rechazan.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    BassBoost(BassBoostLevel),
    Nightcore(bool),
    Vaporwave(bool),
    Speed(f32),
    Pitch(f32),
    /// Frecuencia en Hz del audio 8D; `<= 0` lo desactiva.
    Rotation(f32),
    Tremolo { frequency: f32, depth: f32 },
    Vibrato { frequency: f32, depth: f32 },
    Karaoke(bool),
    Equalizer(Option<Vec<EqualizerBand>>),
    ChannelMix(Option<ChannelMixOptions>),
    Distortion(Option<DistortionOptions>),
}

const DEFAULT_MODULATION_FREQUENCY: f32 = 4.0;
const DEFAULT_MODULATION_DEPTH: f32 = 0.5;

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::BassBoost(_) => "bassboost",
            Effect::Nightcore(_) => "nightcore",
            Effect::Vaporwave(_) => "vaporwave",
            Effect::Speed(_) => "speed",
            Effect::Pitch(_) => "pitch",
            Effect::Rotation(_) => "rotation",
            Effect::Tremolo { .. } => "tremolo",
            Effect::Vibrato { .. } => "vibrato",
            Effect::Karaoke(_) => "karaoke",
            Effect::Equalizer(_) => "equalizer",
            Effect::ChannelMix(_) => "channelmix",
            Effect::Distortion(_) => "distortion",
        }
    }

    /// Escribe el efecto (ya acotado) en su slot de la cadena.
    pub fn apply_to(self, chain: &mut FilterChainState) {
        match self {
            Effect::BassBoost(level) => {
                chain.low_pass = level.smoothing().map(|smoothing| LowPassOptions { smoothing });
            }
            Effect::Nightcore(enabled) => {
                chain.timescale = enabled.then(|| TimescaleOptions::new(1.25, 1.25, 1.0));
            }
            Effect::Vaporwave(enabled) => {
                chain.timescale = enabled.then(|| TimescaleOptions::new(0.8, 0.8, 1.0));
            }
            Effect::Speed(speed) => {
                let speed = clamp_or(speed, 0.5, 2.0, 1.0);
                chain.timescale = Some(TimescaleOptions::new(speed, 1.0, 1.0));
            }
            Effect::Pitch(pitch) => {
                let pitch = clamp_or(pitch, 0.5, 2.0, 1.0);
                chain.timescale = Some(TimescaleOptions::new(1.0, pitch, 1.0));
            }
            Effect::Rotation(hz) => {
                // NaN también desactiva
                chain.rotation = if hz > 0.0 {
                    Some(RotationOptions {
                        rotation_hz: hz.clamp(0.01, 1.0),
                    })
                } else {
                    None
                };
            }
            Effect::Tremolo { frequency, depth } => {
                chain.tremolo = Some(TremoloOptions {
                    frequency: clamp_or(frequency, 0.1, 20.0, DEFAULT_MODULATION_FREQUENCY),
                    depth: clamp_or(depth, 0.01, 1.0, DEFAULT_MODULATION_DEPTH),
                });
            }
            Effect::Vibrato { frequency, depth } => {
                chain.vibrato = Some(VibratoOptions {
                    frequency: clamp_or(frequency, 0.1, 14.0, DEFAULT_MODULATION_FREQUENCY),
                    depth: clamp_or(depth, 0.01, 1.0, DEFAULT_MODULATION_DEPTH),
                });
            }
            Effect::Karaoke(enabled) => {
                chain.karaoke = enabled.then(KaraokeOptions::default);
            }
            Effect::Equalizer(bands) => chain.equalizer = bands,
            Effect::ChannelMix(mix) => chain.channel_mix = mix,
            Effect::Distortion(distortion) => chain.distortion = distortion,
        }
        debug!("🎛️ Cadena de filtros con {} slots activos", chain.active_count());
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn applied(effect: Effect) -> FilterChainState {
        let mut chain = FilterChainState::default();
        effect.apply_to(&mut chain);
        chain
    }

    #[test]
    fn test_bass_boost_levels() {
        assert_eq!(BassBoostLevel::default(), BassBoostLevel::Medium);
        assert_eq!(
            applied(Effect::BassBoost(BassBoostLevel::default())).low_pass,
            Some(LowPassOptions { smoothing: 15.0 })
        );
        assert_eq!(
            applied(Effect::BassBoost(BassBoostLevel::Extreme)).low_pass,
            Some(LowPassOptions { smoothing: 25.0 })
        );
        assert_eq!(
            applied(Effect::BassBoost(BassBoostLevel::Low)).low_pass,
            Some(LowPassOptions { smoothing: 10.0 })
        );

        let mut chain = applied(Effect::BassBoost(BassBoostLevel::High));
        Effect::BassBoost(BassBoostLevel::Off).apply_to(&mut chain);
        assert_eq!(chain.low_pass, None);
    }

    #[test]
    fn test_timescale_presets_and_clamping() {
        assert_eq!(
            applied(Effect::Nightcore(true)).timescale,
            Some(TimescaleOptions::new(1.25, 1.25, 1.0))
        );
        assert_eq!(
            applied(Effect::Vaporwave(true)).timescale,
            Some(TimescaleOptions::new(0.8, 0.8, 1.0))
        );
        assert_eq!(
            applied(Effect::Speed(3.5)).timescale,
            Some(TimescaleOptions::new(2.0, 1.0, 1.0))
        );
        assert_eq!(
            applied(Effect::Pitch(0.1)).timescale,
            Some(TimescaleOptions::new(1.0, 0.5, 1.0))
        );
        assert_eq!(
            applied(Effect::Speed(f32::NAN)).timescale,
            Some(TimescaleOptions::new(1.0, 1.0, 1.0))
        );

        let mut chain = applied(Effect::Nightcore(true));
        Effect::Vaporwave(false).apply_to(&mut chain);
        assert_eq!(chain.timescale, None);
    }

    #[test]
    fn test_rotation_disable_and_range() {
        assert_eq!(applied(Effect::Rotation(0.0)).rotation, None);
        assert_eq!(applied(Effect::Rotation(-1.0)).rotation, None);
        assert_eq!(applied(Effect::Rotation(f32::NAN)).rotation, None);
        assert_eq!(
            applied(Effect::Rotation(5.0)).rotation,
            Some(RotationOptions { rotation_hz: 1.0 })
        );
        assert_eq!(
            applied(Effect::Rotation(0.001)).rotation,
            Some(RotationOptions { rotation_hz: 0.01 })
        );
    }

    #[test]
    fn test_modulation_ranges() {
        assert_eq!(
            applied(Effect::Tremolo { frequency: 50.0, depth: 0.0 }).tremolo,
            Some(TremoloOptions { frequency: 20.0, depth: 0.01 })
        );
        assert_eq!(
            applied(Effect::Vibrato { frequency: 20.0, depth: 2.0 }).vibrato,
            Some(VibratoOptions { frequency: 14.0, depth: 1.0 })
        );
        assert_eq!(
            applied(Effect::Vibrato { frequency: 0.0, depth: 0.5 }).vibrato,
            Some(VibratoOptions { frequency: 0.1, depth: 0.5 })
        );
    }

    #[test]
    fn test_karaoke_fixed_parameters() {
        assert_eq!(
            applied(Effect::Karaoke(true)).karaoke,
            Some(KaraokeOptions {
                level: 3.0,
                mono_level: 1.0,
                filter_band: 1.0,
                filter_width: 1.0,
            })
        );
        assert_eq!(applied(Effect::Karaoke(false)).karaoke, None);
    }
}
