//! Decode command implementation

use super::print_result;
use crate::providers::ProviderKind;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Provider whose codec to use
    #[arg(long, value_enum)]
    pub provider: ProviderKind,

    /// Raw frames; read one per line from stdin when omitted
    pub frames: Vec<String>,
}

impl DecodeArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let codec = self.provider.codec();

        if !self.frames.is_empty() {
            for frame in &self.frames {
                for result in codec.decode(frame) {
                    print_result(&result)?;
                }
            }
            return Ok(());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            for result in codec.decode(&line) {
                print_result(&result)?;
            }
        }
        Ok(())
    }
}
