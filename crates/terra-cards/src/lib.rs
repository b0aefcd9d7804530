//! Floating info cards.
//!
//! [`CardManager`] turns [`terra_config::CardRecord`]s into camera-facing
//! billboards with procedurally painted textures and animates them in and
//! out of view.

pub mod canvas;
pub mod font;
pub mod manager;

pub use canvas::{CardCanvas, card_texture, render_card};
pub use manager::{CardDirection, CardLayout, CardManager, CardPhase};
