mod smiles;
pub use smiles::*;

mod smarts;
pub use smarts::*;

mod typelist;
pub use typelist::*;
