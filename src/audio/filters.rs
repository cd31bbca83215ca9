use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audio::{effects::Effect, session::GuildSession},
    error::SessionResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    pub band: u8,
    pub gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeOptions {
    pub level: f32,
    pub mono_level: f32,
    pub filter_band: f32,
    pub filter_width: f32,
}

impl Default for KaraokeOptions {
    fn default() -> Self {
        Self {
            level: 3.0,
            mono_level: 1.0,
            filter_band: 1.0,
            filter_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimescaleOptions {
    pub speed: f32,
    pub pitch: f32,
    pub rate: f32,
}

impl TimescaleOptions {
    pub fn new(speed: f32, pitch: f32, rate: f32) -> Self {
        Self { speed, pitch, rate }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloOptions {
    pub frequency: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibratoOptions {
    pub frequency: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationOptions {
    pub rotation_hz: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistortionOptions {
    pub sin_offset: f32,
    pub sin_scale: f32,
    pub cos_offset: f32,
    pub cos_scale: f32,
    pub tan_offset: f32,
    pub tan_scale: f32,
    pub offset: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMixOptions {
    pub left_to_left: f32,
    pub left_to_right: f32,
    pub right_to_left: f32,
    pub right_to_right: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPassOptions {
    pub smoothing: f32,
}

/// Conjunto completo de filtros activos de una sesión.
///
/// Un slot en `None` significa que el efecto está desactivado. Se envía entero
/// al motor en cada commit; se serializa con el formato de filtros de Lavalink
/// omitiendo los slots vacíos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterChainState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<EqualizerBand>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<KaraokeOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timescale: Option<TimescaleOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<TremoloOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<VibratoOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distortion: Option<DistortionOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_mix: Option<ChannelMixOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_pass: Option<LowPassOptions>,
}

impl FilterChainState {
    pub fn active_count(&self) -> usize {
        [
            self.equalizer.is_some(),
            self.karaoke.is_some(),
            self.timescale.is_some(),
            self.tremolo.is_some(),
            self.vibrato.is_some(),
            self.rotation.is_some(),
            self.distortion.is_some(),
            self.channel_mix.is_some(),
            self.low_pass.is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

/// Mutaciones de la cadena de filtros. Sólo se obtiene a través de un
/// [`SessionGuard`](crate::audio::session::SessionGuard).
///
/// Cada cambio es leer → modificar → commit completo → guardar, todo con el
/// lock de la sesión tomado, así dos comandos concurrentes nunca pisan el
/// cambio del otro.
pub struct FilterChainController<'a> {
    session: &'a GuildSession,
}

impl<'a> FilterChainController<'a> {
    pub(crate) fn new(session: &'a GuildSession) -> Self {
        Self { session }
    }

    /// Aplica un efecto y confirma la cadena completa en el motor.
    pub async fn set_effect(&self, effect: Effect) -> SessionResult<FilterChainState> {
        let name = effect.name();
        let mut next = self.session.read(|state| state.filters.clone());
        effect.apply_to(&mut next);

        let committed = self.commit(next).await?;
        info!("🎚️ Filtro '{}' aplicado en guild {}", name, self.session.guild_id());
        Ok(committed)
    }

    /// Desactiva todos los filtros con un único commit.
    pub async fn clear_all(&self) -> SessionResult<FilterChainState> {
        let committed = self.commit(FilterChainState::default()).await?;
        info!("🧹 Filtros limpiados en guild {}", self.session.guild_id());
        Ok(committed)
    }

    pub fn current(&self) -> FilterChainState {
        self.session.read(|state| state.filters.clone())
    }

    // Si el motor falla el estado en memoria no cambia
    async fn commit(&self, next: FilterChainState) -> SessionResult<FilterChainState> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().apply_filters(guild_id, &next))
            .await?;
        self.session.write(|state| state.filters = next.clone());
        Ok(next)
    }
}
