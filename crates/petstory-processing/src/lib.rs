//! Document assembly for one order: the multi-page printable kit (PDF) and
//! the standalone tribute page (HTML).

pub mod compositor;
pub mod layout;
pub mod tribute;

pub use compositor::{compose_digital_kit, kit_page_count, ComposeError, KitSpec};
pub use tribute::{RenderError, TributeRenderer};
