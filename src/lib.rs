//! # Trustflow
//!
//! Device, gateway and fleet trust chains over multi-signature envelopes.
//!
//! ## Features
//!
//! - **Role-scoped keys** with packed capability, origin and role flags
//! - **Layered envelopes**: each party appends one signature layer, and a
//!   cosignature can bind to the layer beneath it
//! - **Declarative flows** compiled once and run concurrently
//! - **Pluggable platform**: crypto, keystore, storage, clock and utilities
//!   are traits with default adapters
//! - **Plugins** that add named APIs during bring-up
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trustflow::{Config, Envelope, Facets, KeyFlags, PluginRegistry, Role, Sdk};
//!
//! # async fn run() -> trustflow::TrustResult<()> {
//! let config = Config::from_json(r#"{"fleetId": "fleet-a"}"#)?;
//! let sdk = Sdk::init(config, Facets::default(), &PluginRegistry::with_defaults()).await?;
//!
//! let keystore = sdk.implementation().platform().keystore();
//! keystore.generate_key(KeyFlags::CAN_SIGN, Some("device"), "fleet-a").await?;
//! keystore
//!     .generate_key(KeyFlags::CAN_SIGN.with_role(Role::FleetSigning), Some("gateway"), "fleet-a")
//!     .await?;
//!
//! let signed = sdk.call("sign", Envelope::new(b"device-reading-42")).await?;
//! let cosigned = sdk.call("cosign", signed.into_envelope()).await?;
//! assert!(sdk.call("verify", cosigned.into_envelope()).await?.is_verified());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 SDK LAYER                   │
//! │       SdkWrapper  |  Plugins  |  APIs       │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │                FLOW LAYER                   │
//! │   Sign | Cosign | Verify | Encrypt/Decrypt  │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              ENVELOPE LAYER                 │
//! │   payload + ordered signature layers        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              PLATFORM LAYER                 │
//! │  Crypto | Keystore | Data | Time | Utils    │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod crypto;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod flow;
pub mod key;
pub mod platform;
pub mod plugin;
pub mod sdk;

// Re-export main types at crate root
pub use envelope::{Envelope, ProtectedHeader, SigningInput};
pub use error::{TrustError, TrustResult};
pub use flow::{CompiledFlow, Flow, FlowArguments, FlowEngine, FlowOutput};
pub use key::{KeyFlags, KeyModel, Origin, Role};
pub use platform::{Config, Facets, Platform};
pub use plugin::{Plugin, PluginBuilder, PluginRegistry};
pub use sdk::{ApiFn, Sdk, SdkWrapper};
