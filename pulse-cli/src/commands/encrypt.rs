//! Print the encrypted envelope for a plaintext.

use anyhow::Result;
use pulse_client::Envelope;

/// Run the encrypt command.
pub fn run(text: &str) -> Result<()> {
    println!("{}", Envelope::new().encrypt(text)?);
    Ok(())
}
