//! # CLI Interface
//!
//! Defines the command-line argument structure for `minuto` using `clap`
//! derive. Every command except `init`, `recover` and `version` unlocks the
//! profile under `--data-dir` with `--password` first.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use minuto_protocol::voucher::Amount;
use minuto_protocol::wallet::VoucherStatus;

/// Minuto voucher wallet.
///
/// Creates, guarantees, pays and audits Minuto vouchers. Everything runs
/// offline; vouchers travel between people as encrypted files.
#[derive(Parser, Debug)]
#[command(name = "minuto", about = "Minuto voucher wallet", version, propagate_version = true)]
pub struct MinutoCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Data folder holding the profile and the voucher folders.
    #[arg(long, short = 'd', global = true, env = "MINUTO_DATA_DIR", default_value = "mdata")]
    pub data_dir: PathBuf,

    /// Profile password.
    #[arg(long, short = 'p', global = true, env = "MINUTO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "MINUTO_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new profile. Prints the recovery seed when none is given.
    Init(InitArgs),
    /// Set a new password (`--password`) using the recovery seed.
    Recover(RecoverArgs),
    /// Print this profile's id and fingerprint.
    Whoami,
    /// Print spendable balances.
    Balance,
    /// List vouchers, optionally only one status.
    List(ListArgs),
    /// Start a new voucher, optionally exporting it to a guarantor.
    CreateVoucher(CreateVoucherArgs),
    /// Guarantee a voucher file received from its creator.
    Guarantee(GuaranteeArgs),
    /// Creator-sign a guaranteed voucher.
    Finalize(LocalIdArgs),
    /// Export a held voucher for another party.
    Export(ExportArgs),
    /// Pay someone. Writes the payment file for the recipient.
    Send(SendArgs),
    /// Open a voucher, guarantee or payment file.
    Import(ImportArgs),
    /// Move a voucher to the trash; trashing it again deletes it.
    Trash(LocalIdArgs),
    /// Archive a voucher.
    Archive(LocalIdArgs),
    /// Take a voucher out of the archive or trash.
    Restore(LocalIdArgs),
    /// Compare voucher copies from other holders against this profile's.
    Audit(AuditArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// BIP-39 recovery seed to restore from. A fresh one is generated
    /// when omitted.
    #[arg(long, env = "MINUTO_SEED", hide_env_values = true)]
    pub seed: Option<String>,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long, default_value = "")]
    pub email: String,

    #[arg(long, default_value = "")]
    pub city: String,
}

#[derive(Args, Debug)]
pub struct RecoverArgs {
    #[arg(long, env = "MINUTO_SEED", hide_env_values = true)]
    pub seed: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// One of unfinished, own, other, used, archived, trashed.
    #[arg(long)]
    pub status: Option<VoucherStatus>,
}

#[derive(Args, Debug)]
pub struct CreateVoucherArgs {
    /// Face value, e.g. `20` or `20.50`.
    #[arg(long)]
    pub amount: Amount,

    /// Region in which the voucher is honored.
    #[arg(long)]
    pub region: String,

    #[arg(long, default_value_t = 3)]
    pub years_valid: u32,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub footnote: Option<String>,

    /// Mark as a test voucher.
    #[arg(long)]
    pub test: bool,

    /// Guarantor id to export the new voucher to.
    #[arg(long, requires = "out")]
    pub guarantor: Option<String>,

    /// Where to write the export.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GuaranteeArgs {
    /// Voucher file from the creator.
    pub file: PathBuf,

    /// Where to write the signature file for the creator.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct LocalIdArgs {
    /// Local voucher id as shown by `list`.
    pub local_id: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    pub local_id: String,

    /// Recipient id.
    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Recipient id.
    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub amount: Amount,

    /// Where to write the payment file.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Voucher or payment files collected from other holders.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
