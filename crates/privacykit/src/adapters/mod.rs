mod arcium;
mod noir;
mod privacy_cash;
mod shadow_wire;

pub use arcium::{ArciumAdapter, ArciumConfig, EncryptedInput, MpcSession};
pub use noir::{CircuitDefinition, NoirAdapter, NoirConfig};
pub use privacy_cash::{PrivacyCashAdapter, PrivacyCashConfig, WithdrawStage};
pub use shadow_wire::{ShadowWireAdapter, ShadowWireConfig};
