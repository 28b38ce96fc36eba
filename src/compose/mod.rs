pub(crate) mod blend;
pub(crate) mod export;
pub(crate) mod layer;
pub(crate) mod mask;
pub(crate) mod surface;
pub(crate) mod view;
