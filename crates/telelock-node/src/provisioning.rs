//! First-boot provisioning of the device identity.
//!
//! The master secret and device identifier are collected once, through a
//! blocking line prompt, and persisted in the identity namespace. Once both
//! are present they are never requested again.

use std::io::{BufRead, Write};

use telelock_crypto::MasterSecret;

use crate::{
    error::KeyChainError,
    storage::{Namespace, Store},
};

/// Store key for the hex master secret.
pub const MASTER_KEY: &str = "master_key";

/// Store key for the device identifier.
pub const DEVICE_ID: &str = "device_id";

/// Blocking source of provisioning answers.
///
/// Invoked at most once per missing value, never inside the steady-state
/// telemetry cycle.
pub trait ProvisioningPrompt {
    /// Show `question` and wait for one answer line, trimmed.
    fn ask(&mut self, question: &str) -> Result<String, KeyChainError>;
}

/// Line-oriented prompt over any reader/writer pair (a serial console,
/// stdin/stdout, or an in-memory script in tests).
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    /// Prompt on `output`, read answers from `input`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ProvisioningPrompt for LinePrompt<R, W> {
    fn ask(&mut self, question: &str) -> Result<String, KeyChainError> {
        write!(self.output, "{question}").map_err(|e| KeyChainError::Prompt(e.to_string()))?;
        self.output.flush().map_err(|e| KeyChainError::Prompt(e.to_string()))?;

        let mut line = String::new();
        let read =
            self.input.read_line(&mut line).map_err(|e| KeyChainError::Prompt(e.to_string()))?;
        if read == 0 {
            return Err(KeyChainError::Prompt("input closed".to_string()));
        }

        Ok(line.trim().to_string())
    }
}

/// Provisioned identity: the chain root and the unit it is bound to.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    master: MasterSecret,
    device_id: String,
}

impl DeviceIdentity {
    /// Load a previously provisioned identity without prompting.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` if either value is absent or empty, and
    /// `InvalidKeyLength` / `InvalidKeyEncoding` if the stored secret does
    /// not decode.
    pub fn load<S: Store>(store: &S) -> Result<Self, KeyChainError> {
        let master = non_empty(store.get_string(Namespace::Identity, MASTER_KEY)?)
            .ok_or(KeyChainError::ConfigurationMissing { what: "master secret" })?;
        let device_id = load_device_id(store)?;

        Ok(Self { master: MasterSecret::from_hex(&master)?, device_id })
    }

    /// Root of the key chain.
    pub fn master(&self) -> &MasterSecret {
        &self.master
    }

    /// Identifier mixed into every derivation.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Load only the device identifier, leaving the master secret unread.
///
/// # Errors
///
/// `ConfigurationMissing` if it is absent or empty, `InvalidDeviceId` if it
/// is not ASCII.
pub fn load_device_id<S: Store>(store: &S) -> Result<String, KeyChainError> {
    let device_id = non_empty(store.get_string(Namespace::Identity, DEVICE_ID)?)
        .ok_or(KeyChainError::ConfigurationMissing { what: "device identifier" })?;
    check_ascii(device_id)
}

/// Ensure the device has an identity, prompting for whatever is missing.
///
/// Both values are validated before anything is written, and written
/// together, so a rejected secret leaves the store untouched.
///
/// # Errors
///
/// - `InvalidKeyLength` unless the secret is 32 or 64 hex characters
/// - `InvalidKeyEncoding` if it has the right length but is not hex
/// - `ConfigurationMissing` for an empty device identifier
/// - `InvalidDeviceId` for a device identifier that is not ASCII
/// - `Prompt` if the console fails or closes
pub fn provision<S: Store, P: ProvisioningPrompt>(
    store: &S,
    prompt: &mut P,
) -> Result<DeviceIdentity, KeyChainError> {
    let stored_master = non_empty(store.get_string(Namespace::Identity, MASTER_KEY)?);
    let stored_id = non_empty(store.get_string(Namespace::Identity, DEVICE_ID)?);

    if let (Some(master), Some(device_id)) = (&stored_master, &stored_id) {
        return Ok(DeviceIdentity {
            master: MasterSecret::from_hex(master)?,
            device_id: check_ascii(device_id.clone())?,
        });
    }

    tracing::warn!("device identity incomplete, requesting provisioning input");

    let master_hex = match stored_master {
        Some(master) => master,
        None => prompt.ask("Enter master key (hex, 32 or 64 characters): ")?,
    };
    let master = MasterSecret::from_hex(&master_hex)?;

    let device_id = match stored_id {
        Some(id) => id,
        None => non_empty(Some(prompt.ask("Enter device identifier: ")?))
            .ok_or(KeyChainError::ConfigurationMissing { what: "device identifier" })?,
    };
    let device_id = check_ascii(device_id)?;

    store.put_batch(
        Namespace::Identity,
        &[(MASTER_KEY, master_hex.trim().as_bytes()), (DEVICE_ID, device_id.as_bytes())],
    )?;

    tracing::info!(device_id = %device_id, master_bytes = master.len(), "device provisioned");

    Ok(DeviceIdentity { master, device_id })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_ascii(device_id: String) -> Result<String, KeyChainError> {
    if device_id.is_ascii() {
        Ok(device_id)
    } else {
        Err(KeyChainError::InvalidDeviceId { device_id })
    }
}
