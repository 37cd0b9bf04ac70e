/*!
 # Effect registry

 Maps effect names to the ids the device understands. The ring model has a
 flat table of named animations. The strip model numbers its animations and
 packs two more families into the upper byte of the id:

 * `0x0001..=0x0063` plain effects, sent as-is
 * `shape << 8` static effects, a shape drawn in a chosen color
 * `(music + 0x32) << 8` sound reactive effects
*/

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::identity::Model;
use crate::{Error, Result};

/// Name reported while no effect is running
pub const EFFECT_OFF: &str = "off";

/// Name reported for ids missing from the registry
pub const EFFECT_UNKNOWN: &str = "Unknown";

/// Offset added to sound reactive effect numbers before shifting
const MUSIC_OFFSET: u8 = 0x32;

const STRIP_EFFECT_COUNT: u16 = 99;
const STRIP_STATIC_SHAPES: std::ops::RangeInclusive<u8> = 2..=10;
const STRIP_MUSIC_EFFECTS: std::ops::RangeInclusive<u8> = 1..=15;

/// Ring light animations, named after what they look like
const RING_EFFECTS: &[(&str, u16)] = &[
    ("goldring", 0x01),
    ("redsfade", 0x02),
    ("orangesfade", 0x03),
    ("yellowsfade", 0x04),
    ("greenspin", 0x05),
    ("bluespin", 0x06),
    ("purplespin", 0x07),
    ("colorloop", 0x08),
    ("redblueflash", 0x09),
    ("colorspin", 0x0a),
    ("colorspiral", 0x0b),
    ("rainbowspin", 0x0c),
    ("redgreenspin", 0x0d),
    ("rgbspin", 0x0e),
    ("redfade", 0x0f),
    ("blueyellowstatic", 0x10),
    ("redgreenstatic", 0x11),
    ("cyanmagentastatic", 0x12),
    ("redgreenspin2", 0x13),
    ("blueyellowspin", 0x14),
    ("cyanmagentaspin", 0x15),
    ("rgbyellowspin", 0x16),
    ("rgbcyanspin", 0x17),
    ("rgbmagentaspin", 0x18),
    ("rgbspin2", 0x19),
    ("rgbyspin", 0x1a),
    ("rgbymspin", 0x1b),
    ("rgbymcspin", 0x1c),
    ("rgbycmwhitespin", 0x1d),
    ("redgreenspin3", 0x1e),
    ("blueyellowspin2", 0x1f),
    ("cyanmagentaspin2", 0x20),
    ("whiteflash", 0x21),
    ("warmwhiteflash", 0x22),
    ("colorfade", 0x23),
    ("whitefade", 0x24),
    ("magentafade", 0x25),
    ("cyanfade", 0x26),
    ("cyanmagentafade", 0x27),
    ("yellowfade", 0x28),
    ("colorloopfade", 0x29),
    ("whitewarmwhitefade", 0x2a),
    ("purplefade", 0x2b),
    ("cyanmagentaloop", 0x2c),
    ("cyanblueloop", 0x2d),
    ("cyanyellowfade", 0x2e),
    ("redyellowfade", 0x2f),
    ("colorstrobe", 0x30),
    ("whitestrobe", 0x31),
    ("magentastrobe", 0x32),
    ("cyanstrobe", 0x33),
    ("yellowstrobe", 0x34),
    ("cyanmagentastrobe", 0x35),
    ("cyanyellowstrobe", 0x36),
    ("whitestroberandom", 0x37),
    ("warmwhitestroberandom", 0x38),
    ("greenstroberandom", 0x39),
    ("magentastroberandom", 0x3a),
    ("cyanstroberandom", 0x3b),
    ("goldgreenring", 0x3c),
    ("cyanring", 0x3d),
    ("colorloopfollow", 0x3e),
    ("cyanmagentaloopfollow", 0x3f),
    ("greenyellowloopfollow", 0x40),
    ("pinkblueloopfollow", 0x41),
    ("pinkbluegreenloopfollow", 0x42),
    ("cyanmagentayellowloopfollow", 0x43),
    ("redmagentaspinner", 0x44),
    ("pinkbluespinner", 0x45),
    ("greenyellowspinner", 0x46),
    ("blueyellowspinner", 0x47),
    ("redyellowspinner", 0x48),
    ("magentagreenspinner", 0x49),
    ("redbluespinner", 0x4a),
    ("greenyellowspinner2", 0x4b),
    ("rgbspinner", 0x4c),
    ("redmagentaspinner2", 0x4d),
    ("purplecyanspinner", 0x4e),
    ("rgbcmspinner", 0x4f),
    ("rgbcmyspinner", 0x50),
    ("rgbspinner2", 0x51),
    ("bcmspinner", 0x52),
    ("redbluespinner2", 0x53),
    ("cyanmagentaspinner2", 0x54),
    ("yelloworangespinner", 0x55),
    ("redbluesmallerspinner", 0x56),
    ("greenyellowsmallerspinner", 0x57),
    ("redmagentayellowsmallerspinner", 0x58),
    ("bluecyanmagentasmallerspinner", 0x59),
    ("greencyanyelloworangesmallerspinner", 0x5a),
    ("rainbowspinner", 0x5b),
    ("redmagentabluespinner", 0x5c),
    ("cyanbluemagentaspinner", 0x5d),
    ("greencyanyellowspinner", 0x5e),
    ("redorangeyellowspinner", 0x5f),
    ("colourstrobe", 0x60),
    ("magentapurplestrobe", 0x61),
    ("yelloworangestrobe", 0x62),
    ("cyanyellowsemistrobe", 0x63),
    ("whitelighteningstrobe", 0x64),
    ("magentallighteningstrobe", 0x65),
    ("purplelighteningstrobe", 0x66),
    ("yellowlighteningstrobe", 0x67),
    ("blueyellowlighteningstrobe", 0x68),
    ("redbluelighteningstrobe", 0x69),
    ("bluemagentalighteningstrobe", 0x6a),
    ("yellowlighteningfade", 0x6b),
    ("magentallighteningfade", 0x6c),
    ("cyanlighteningfade", 0x6d),
    ("redgreenlighteningfade", 0x6e),
    ("redgreenbluelighteningfade", 0x6f),
    ("magentacyanredlighteningfade", 0x70),
];

/// Which family an effect id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Id fits in one byte and is sent directly
    Plain(u8),
    /// Strip static effect, carries the shape number
    Static(u8),
    /// Strip sound reactive effect, carries the music number
    Music(u8),
}

impl EffectKind {
    pub fn from_id(id: u16) -> EffectKind {
        let [hi, lo] = id.to_be_bytes();
        if hi == 0 {
            EffectKind::Plain(lo)
        } else if hi > MUSIC_OFFSET {
            EffectKind::Music(hi - MUSIC_OFFSET)
        } else {
            EffectKind::Static(hi)
        }
    }

    pub fn static_id(shape: u8) -> u16 {
        u16::from(shape) << 8
    }

    pub fn music_id(music: u8) -> u16 {
        u16::from(music.saturating_add(MUSIC_OFFSET)) << 8
    }
}

struct Registry {
    ids: HashMap<String, u16>,
    names: HashMap<u16, String>,
    sorted: Vec<String>,
}

impl Registry {
    fn build(entries: impl IntoIterator<Item = (String, u16)>) -> Self {
        let mut ids = HashMap::new();
        let mut names = HashMap::new();
        for (name, id) in entries {
            names.insert(id, name.clone());
            ids.insert(name, id);
        }
        let mut sorted: Vec<String> = ids.keys().cloned().collect();
        sorted.sort();
        Self { ids, names, sorted }
    }
}

static RING: LazyLock<Registry> = LazyLock::new(|| {
    Registry::build(
        RING_EFFECTS
            .iter()
            .map(|(name, id)| ((*name).to_string(), *id)),
    )
});

static STRIP: LazyLock<Registry> = LazyLock::new(|| {
    let plain = (1..=STRIP_EFFECT_COUNT).map(|n| (format!("Effect {n}"), n));
    let statics = STRIP_STATIC_SHAPES
        .map(|n| (format!("Static Effect {n}"), EffectKind::static_id(n)));
    let music = STRIP_MUSIC_EFFECTS
        .map(|n| (format!("Sound Reactive {n}"), EffectKind::music_id(n)));
    Registry::build(plain.chain(statics).chain(music))
});

fn registry(model: Model) -> &'static Registry {
    match model {
        Model::Ring => &RING,
        Model::Strip => &STRIP,
    }
}

/// Every effect name the model supports, sorted
pub fn effect_list(model: Model) -> &'static [String] {
    &registry(model).sorted
}

/// Looks up the wire id of an effect name
pub fn effect_id(model: Model, name: &str) -> Result<u16> {
    registry(model)
        .ids
        .get(name)
        .copied()
        .ok_or_else(|| Error::EffectNotSupported(name.to_string()))
}

/// Looks up the name of a wire id, [`EFFECT_UNKNOWN`] if the model has none
pub fn effect_name(model: Model, id: u16) -> &'static str {
    registry(model)
        .names
        .get(&id)
        .map_or(EFFECT_UNKNOWN, String::as_str)
}
