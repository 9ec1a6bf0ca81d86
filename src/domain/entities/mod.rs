pub mod image;
pub mod metadata;
pub mod reference;
pub mod response;
pub mod token;
pub mod variant;
