pub mod presenter;
pub mod scene;
pub mod transform;

pub use presenter::{Presenter, View};
pub use scene::{EntityKind, Scene, SceneItem, StatusBanner};
pub use transform::{Scaled, ScreenTransform};
