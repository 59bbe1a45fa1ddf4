// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Minuto Wallet
//!
//! Entry point for the `minuto` binary. Parses CLI arguments, initializes
//! logging, unlocks the profile and runs one command against it.
//!
//! - `init` / `recover`          create a profile or reset its password
//! - `whoami` / `balance` / `list` inspect the profile
//! - `create-voucher` / `guarantee` / `finalize` / `export` issue vouchers
//! - `send` / `import`           move vouchers between people
//! - `trash` / `archive` / `restore` / `audit` maintain the collection

mod cli;
mod logging;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use minuto_protocol::config::{StoreConfig, ENVELOPE_VERSION, PROFILE_VERSION};
use minuto_protocol::crypto::generate_seed;
use minuto_protocol::identity::PersonInfo;
use minuto_protocol::storage::{ExchangePayload, ImportOutcome, Session, TrashResult};
use minuto_protocol::voucher::VoucherDraft;
use minuto_protocol::wallet::VoucherStatus;

use cli::{Commands, GlobalArgs, MinutoCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = MinutoCli::parse();
    logging::init_logging(
        "minuto=info,minuto_protocol=warn",
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    let global = cli.global;
    match cli.command {
        Commands::Init(args) => init_profile(&global, args),
        Commands::Recover(args) => recover_profile(&global, args),
        Commands::Version => {
            print_version();
            Ok(())
        }
        command => {
            let mut session = unlock(&global)?;
            run(&mut session, command)?;
            session.logout().context("failed to save profile")
        }
    }
}

fn store_config(global: &GlobalArgs) -> StoreConfig {
    StoreConfig::new(global.data_dir.clone())
}

fn password(global: &GlobalArgs) -> Result<&str> {
    global
        .password
        .as_deref()
        .ok_or_else(|| anyhow!("a password is required (--password or MINUTO_PASSWORD)"))
}

fn unlock(global: &GlobalArgs) -> Result<Session> {
    let config = store_config(global);
    if !Session::profile_exists(&config) {
        bail!(
            "no profile under {}; run `minuto init` first",
            config.data_root().display()
        );
    }
    Session::unlock(config, password(global)?).context("failed to unlock profile")
}

/// Creates a profile, generating a recovery seed if none was supplied.
fn init_profile(global: &GlobalArgs, args: cli::InitArgs) -> Result<()> {
    let password = password(global)?;
    let (seed, generated) = match args.seed {
        Some(seed) => (seed, false),
        None => (generate_seed().context("failed to generate recovery seed")?, true),
    };

    let mut person = PersonInfo::named(args.first_name, args.last_name);
    person.email = args.email;
    person.city = args.city;

    let session = Session::create_profile(store_config(global), &seed, person, password)
        .context("failed to create profile")?;

    println!("Profile created.");
    println!("  Data directory : {}", global.data_dir.display());
    println!("  Id             : {}", session.id());
    println!("  Fingerprint    : {}", session.identity().fingerprint_display());
    if generated {
        println!();
        println!("Recovery seed (write it down, it is shown only once):");
        println!("  {seed}");
    }
    session.logout()?;
    Ok(())
}

fn recover_profile(global: &GlobalArgs, args: cli::RecoverArgs) -> Result<()> {
    let session =
        Session::recover_password_with_seed(store_config(global), &args.seed, password(global)?)
            .context("failed to recover profile")?;
    println!("Password reset for {}", session.id());
    session.logout()?;
    Ok(())
}

fn run(session: &mut Session, command: Commands) -> Result<()> {
    match command {
        Commands::Whoami => {
            println!("{}", session.id());
            println!("  Name        : {}", session.person().display_name());
            println!("  Fingerprint : {}", session.identity().fingerprint_display());
        }
        Commands::Balance => {
            let own = session.balance(VoucherStatus::Own);
            let other = session.balance(VoucherStatus::Other);
            println!("own   : {}", own.display_with_unit());
            println!("other : {}", other.display_with_unit());
            let total = own.checked_add(other).ok_or_else(|| anyhow!("balance overflow"))?;
            println!("total : {}", total.display_with_unit());
        }
        Commands::List(args) => list(session, args.status),
        Commands::CreateVoucher(args) => {
            let mut draft = VoucherDraft::new(session.person().clone(), args.amount, args.region)
                .years_valid(args.years_valid)
                .test_voucher(args.test);
            if let Some(text) = args.description {
                draft = draft.description(text);
            }
            if let Some(text) = args.footnote {
                draft = draft.footnote(text);
            }
            let local_id = session.create_voucher(draft)?;
            println!("{local_id}");
            if let (Some(guarantor), Some(out)) = (args.guarantor, args.out) {
                session.export_voucher(&local_id, &guarantor, &out)?;
                println!("exported for {guarantor} to {}", out.display());
            }
        }
        Commands::Guarantee(args) => {
            let voucher = match session.read_file(&args.file)? {
                ExchangePayload::Voucher(voucher) => voucher,
                other => bail!("{} holds a {}, not a voucher", args.file.display(), other.kind()),
            };
            session.open_file(&args.file)?;
            let local_id = voucher.compute_local_id(session.id());
            let bundle = session.sign_as_guarantor(&local_id)?;
            session.export(
                &ExchangePayload::GuarantorSignatures(bundle),
                voucher.creator_id(),
                &args.out,
            )?;
            println!("signature for {} written to {}", voucher.creator_id(), args.out.display());
        }
        Commands::Finalize(args) => {
            let local_id = session.sign_as_creator(&args.local_id)?;
            println!("{local_id}");
        }
        Commands::Export(args) => {
            session.export_voucher(&args.local_id, &args.to, &args.out)?;
            println!("exported to {}", args.out.display());
        }
        Commands::Send(args) => {
            let bundle = session.send(&args.to, args.amount)?;
            let vouchers = bundle.vouchers.len();
            session.export(&ExchangePayload::Payment(bundle), &args.to, &args.out)?;
            println!(
                "sent {} in {vouchers} voucher(s); payment file {}",
                args.amount.display_with_unit(),
                args.out.display()
            );
        }
        Commands::Import(args) => match session.open_file(&args.file)? {
            ImportOutcome::Voucher { status: Some(status) } => println!("voucher filed as {status}"),
            ImportOutcome::Voucher { status: None } => println!("voucher already held"),
            ImportOutcome::GuarantorSignatures { voucher_id, added } => {
                println!("{added} guarantor signature(s) added to {voucher_id}")
            }
            ImportOutcome::Payment { amount, filed } => {
                println!("received {} in {} voucher(s)", amount.display_with_unit(), filed.len())
            }
        },
        Commands::Trash(args) => match session.trash(&args.local_id)? {
            TrashResult::Trashed => println!("{} moved to trash", args.local_id),
            TrashResult::Deleted => println!("{} deleted", args.local_id),
        },
        Commands::Archive(args) => {
            session.archive(&args.local_id)?;
            println!("{} archived", args.local_id);
        }
        Commands::Restore(args) => {
            let status = session.restore(&args.local_id)?;
            println!("{} restored as {status}", args.local_id);
        }
        Commands::Audit(args) => {
            let mut copies = Vec::new();
            for path in &args.files {
                match session
                    .read_file(path)
                    .with_context(|| format!("failed to read {}", path.display()))?
                {
                    ExchangePayload::Voucher(voucher) => copies.push(voucher),
                    ExchangePayload::Payment(bundle) => copies.extend(bundle.vouchers),
                    ExchangePayload::GuarantorSignatures(_) => {
                        tracing::warn!(path = %path.display(), "skipping signature file")
                    }
                }
            }
            let conflicts = session.audit(&copies);
            if conflicts.is_empty() {
                println!("no double spends found in {} copies", copies.len());
            }
            for evidence in conflicts {
                println!("DOUBLE SPEND in voucher {}", evidence.voucher_id);
                println!("  sender     : {}", evidence.sender_id);
                println!("  after      : {}", evidence.previous_t_id);
                println!("  balance    : {}", evidence.previous_balance.display_with_unit());
                println!("  spent      : {}", evidence.total_spent.display_with_unit());
                println!("  overspent  : {}", evidence.overspent().display_with_unit());
                for t_id in &evidence.conflicting_t_ids {
                    println!("  record     : {t_id}");
                }
            }
        }
        Commands::Init(_) | Commands::Recover(_) | Commands::Version => {
            bail!("command does not run against an unlocked profile")
        }
    }
    Ok(())
}

fn list(session: &Session, status: Option<VoucherStatus>) {
    let statuses = match status {
        Some(status) => vec![status],
        None => VoucherStatus::ALL.to_vec(),
    };
    for status in statuses {
        for voucher in session.list(status) {
            println!(
                "{:<10} {:<16} {:>12} / {:<12} {:?}  {}",
                status.to_string(),
                voucher.local.local_id.as_deref().unwrap_or("-"),
                voucher.amount_available_to(session.id()).display_with_unit(),
                voucher.face_value().display_with_unit(),
                voucher.signature_state(),
                voucher.creation.region,
            );
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("minuto   {}", env!("CARGO_PKG_VERSION"));
    println!("envelope v{ENVELOPE_VERSION}");
    println!("profile  v{PROFILE_VERSION}");
}
