//! Wristband cards and slot numbering
//!
//! Cards sharing a namespace share one slot space. Each card numbers its rows
//! by its own policy:
//! - `Sequential { start }`: non-header rows are numbered `start, start + 1, ...`
//!   in order; header rows carry no number
//! - `Explicit`: each row carries its own `slot`
//!
//! A slot may be held by only one play per namespace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most empty rows one assignment may append to a sequential card
pub const MAX_SLOT_GROWTH: u32 = 64;

/// Row numbering policy for one card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Numbering {
    Sequential { start: u32 },
    Explicit,
}

impl Default for Numbering {
    fn default() -> Self {
        Self::Sequential { start: 1 }
    }
}

/// One row on a card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WristbandRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_id: Option<String>,
    #[serde(default)]
    pub header: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
}

impl WristbandRow {
    /// Header/label row
    #[must_use]
    pub fn header() -> Self {
        Self {
            header: true,
            ..Self::default()
        }
    }

    /// Row holding a play
    #[must_use]
    pub fn play(play_id: impl Into<String>) -> Self {
        Self {
            play_id: Some(play_id.into()),
            ..Self::default()
        }
    }

    /// Row holding a play at an explicit slot
    #[must_use]
    pub fn at(play_id: impl Into<String>, slot: u32) -> Self {
        Self {
            slot: Some(slot),
            ..Self::play(play_id)
        }
    }
}

/// One printable card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WristbandCard {
    pub id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub numbering: Numbering,
    #[serde(default)]
    pub rows: Vec<WristbandRow>,
}

impl WristbandCard {
    /// Create an empty card
    #[must_use]
    pub fn new(id: impl Into<String>, namespace: impl Into<String>, numbering: Numbering) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            numbering,
            rows: Vec::new(),
        }
    }

    /// Builder-style row append
    #[must_use]
    pub fn with_row(mut self, row: WristbandRow) -> Self {
        self.rows.push(row);
        self
    }

    /// `(slot, row index)` for every numbered row, occupied or not
    ///
    /// Sequential rows whose number would pass `u32::MAX` carry no slot.
    pub fn numbered_rows(&self) -> Vec<(u32, usize)> {
        match self.numbering {
            Numbering::Sequential { start } => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| !row.header)
                .zip((0u32..).map_while(|offset| start.checked_add(offset)))
                .map(|((index, _), slot)| (slot, index))
                .collect(),
            Numbering::Explicit => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| !row.header)
                .filter_map(|(index, row)| row.slot.map(|slot| (slot, index)))
                .collect(),
        }
    }
}

/// Wristband slice value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WristbandSettings {
    #[serde(default)]
    pub cards: Vec<WristbandCard>,
}

impl WristbandSettings {
    /// Parse from a slice value, tolerating absent fields
    ///
    /// # Errors
    /// Returns the serde error when the value has an unexpected shape
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Serialize back into a slice value
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Builder-style card append
    #[must_use]
    pub fn with_card(mut self, card: WristbandCard) -> Self {
        self.cards.push(card);
        self
    }

    /// Find a card by id
    #[must_use]
    pub fn card(&self, id: &str) -> Option<&WristbandCard> {
        self.cards.iter().find(|c| c.id == id)
    }
}

/// A play holding a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOccupant {
    pub namespace: String,
    pub card_id: String,
    pub slot: u32,
    pub play_id: String,
}

/// Slot already held by another play in the namespace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot {slot} in namespace '{namespace}' is held by play '{occupant}' on card '{card_id}'")]
pub struct SlotConflict {
    pub namespace: String,
    pub slot: u32,
    pub card_id: String,
    pub occupant: String,
}

/// Slot assignment failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error(transparent)]
    Conflict(#[from] SlotConflict),

    #[error("no wristband card '{0}'")]
    UnknownCard(String),

    #[error("slot {slot} is below card '{card_id}' start {start}")]
    OutOfRange { card_id: String, slot: u32, start: u32 },

    #[error("slot {slot} is more than {} rows past the end of card '{card_id}'", MAX_SLOT_GROWTH)]
    BeyondCard { card_id: String, slot: u32 },
}

/// Every occupied slot across all cards
#[must_use]
pub fn occupants(settings: &WristbandSettings) -> Vec<SlotOccupant> {
    let mut out = Vec::new();
    for card in &settings.cards {
        for (slot, index) in card.numbered_rows() {
            if let Some(play_id) = &card.rows[index].play_id {
                out.push(SlotOccupant {
                    namespace: card.namespace.clone(),
                    card_id: card.id.clone(),
                    slot,
                    play_id: play_id.clone(),
                });
            }
        }
    }
    out
}

/// Check that `play_id` may take `slot` in `namespace`
///
/// The same play already holding the slot is not a conflict.
///
/// # Errors
/// `SlotConflict` naming the first other play found at the slot
pub fn check_slot(
    settings: &WristbandSettings,
    namespace: &str,
    slot: u32,
    play_id: &str,
) -> Result<(), SlotConflict> {
    match occupants(settings)
        .into_iter()
        .find(|o| o.namespace == namespace && o.slot == slot && o.play_id != play_id)
    {
        Some(o) => Err(SlotConflict {
            namespace: o.namespace,
            slot,
            card_id: o.card_id,
            occupant: o.play_id,
        }),
        None => Ok(()),
    }
}

/// Existing slots held by more than one play within a namespace
#[must_use]
pub fn find_conflicts(settings: &WristbandSettings) -> Vec<SlotConflict> {
    let all = occupants(settings);
    let mut conflicts = Vec::new();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.namespace == b.namespace && a.slot == b.slot && a.play_id != b.play_id {
                conflicts.push(SlotConflict {
                    namespace: b.namespace.clone(),
                    slot: b.slot,
                    card_id: a.card_id.clone(),
                    occupant: a.play_id.clone(),
                });
            }
        }
    }
    conflicts
}

/// Place `play_id` at `slot` on a card after checking its namespace
///
/// Nothing is mutated when the check fails. Sequential cards grow empty rows to
/// reach the slot, at most [`MAX_SLOT_GROWTH`] of them; explicit cards gain or
/// update a row carrying the slot.
///
/// # Errors
/// `UnknownCard`, `OutOfRange` below a sequential start, `BeyondCard` past the
/// growth limit, or `Conflict`
pub fn assign_slot(
    settings: &mut WristbandSettings,
    card_id: &str,
    play_id: &str,
    slot: u32,
) -> Result<(), SlotError> {
    let card = settings
        .card(card_id)
        .ok_or_else(|| SlotError::UnknownCard(card_id.to_string()))?;
    if let Numbering::Sequential { start } = card.numbering {
        if slot < start {
            return Err(SlotError::OutOfRange {
                card_id: card_id.to_string(),
                slot,
                start,
            });
        }
        let numbered = card.rows.iter().filter(|r| !r.header).count() as u64;
        if u64::from(slot - start) >= numbered + u64::from(MAX_SLOT_GROWTH) {
            return Err(SlotError::BeyondCard {
                card_id: card_id.to_string(),
                slot,
            });
        }
    }
    let namespace = card.namespace.clone();
    check_slot(settings, &namespace, slot, play_id)?;

    let Some(card) = settings.cards.iter_mut().find(|c| c.id == card_id) else {
        return Err(SlotError::UnknownCard(card_id.to_string()));
    };
    match card.numbering {
        Numbering::Sequential { start } => {
            let wanted = (slot - start) as usize;
            let mut numbered = card.rows.iter().filter(|r| !r.header).count();
            while numbered <= wanted {
                card.rows.push(WristbandRow::default());
                numbered += 1;
            }
            let index = card
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.header)
                .nth(wanted)
                .map(|(index, _)| index);
            if let Some(index) = index {
                card.rows[index].play_id = Some(play_id.to_string());
            }
        }
        Numbering::Explicit => {
            match card.rows.iter_mut().find(|r| !r.header && r.slot == Some(slot)) {
                Some(row) => row.play_id = Some(play_id.to_string()),
                None => card.rows.push(WristbandRow::at(play_id, slot)),
            }
        }
    }
    tracing::debug!(card = card_id, play = play_id, slot, "assigned wristband slot");
    Ok(())
}
