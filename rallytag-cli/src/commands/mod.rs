use comfy_table::{presets::UTF8_FULL, Table};
use rallytag_core::{
    AuthProvider, CoreError, EnvAuth, Identity, JoinReceipt, MatchStore, MatchType, Storage,
    VerificationClaim, VerificationService,
};
use rallytag_scan::{
    capture, codec, CaptureLoop, CaptureOutcome, GuestEntryFlow, GuestOutcome, HostSession,
    PendingVerification, ScriptedCamera, SessionState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn resolve_identity(user: &Option<String>) -> Result<Identity, Box<dyn std::error::Error>> {
    if let Some(user) = user {
        return Ok(Identity::new(user.clone()));
    }
    EnvAuth
        .current_actor()
        .ok_or_else(|| "no acting user: pass --user or set RALLYTAG_USER".into())
}

fn pending_stash_path(data_dir: &Path) -> PathBuf {
    data_dir.join("pending_verification.json")
}

/// Print the outcome of a verification attempt. Every verification
/// failure is a user-level outcome here, not a process failure;
/// notably a repeated submission is benign.
fn report_verification(result: Result<JoinReceipt, rallytag_scan::ScanError>) -> CliResult {
    use rallytag_scan::ScanError;

    match result {
        Ok(receipt) => {
            println!(
                "Verified: participant {}/{} of match {}",
                receipt.participant_count, receipt.target, receipt.match_id
            );
            if receipt.confirmed() {
                println!("Match confirmed!");
            }
            Ok(())
        }
        Err(ScanError::Core(CoreError::AlreadyJoined)) => {
            println!("You are already counted for this match. Nothing to do.");
            Ok(())
        }
        Err(ScanError::Core(CoreError::InvalidCode)) => {
            println!("That code is not valid for this match. Check it and try again.");
            Ok(())
        }
        Err(ScanError::Core(CoreError::MatchNotFound(id))) => {
            println!("No match with id {} exists.", id);
            Ok(())
        }
        Err(ScanError::Core(CoreError::MatchFull)) => {
            println!("This match already has its full set of participants.");
            Ok(())
        }
        Err(other) => Err(other.into()),
    }
}

pub async fn host_match(
    storage: Arc<Storage>,
    user: &Option<String>,
    match_type: Option<&str>,
    base_url: &str,
    poll_interval_secs: u64,
) -> CliResult {
    let identity = resolve_identity(user)?;

    let match_type = match match_type {
        Some(s) => s.parse::<MatchType>()?,
        None => {
            let choice = dialoguer::Select::new()
                .with_prompt("Match type")
                .items(&["singles (2 players)", "doubles (4 players)"])
                .default(0)
                .interact()?;
            if choice == 0 {
                MatchType::Singles
            } else {
                MatchType::Doubles
            }
        }
    };

    let mut session = HostSession::new(storage)
        .with_poll_interval(Duration::from_secs(poll_interval_secs));
    let hosted = session.create_session(&identity, match_type).await?;
    let url = codec::encode(base_url, &hosted.match_id, &hosted.secret)?;

    println!("Hosting {} match {}", match_type, hosted.match_id);
    println!("Code:  {}", hosted.secret);
    println!("Link:  {}", url);
    println!(
        "Waiting for {} participants to verify (ctrl-c cancels)...",
        hosted.target
    );

    let mut states = session.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.cancel()?;
                println!("Session cancelled.");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow().clone();
                match state {
                    SessionState::Hosting { participants, target, .. } => {
                        println!("{}/{} verified", participants, target);
                    }
                    SessionState::Confirmed { match_id } => {
                        println!("Match {} confirmed!", match_id);
                        break;
                    }
                    _ => break,
                }
            }
        }
    }

    Ok(())
}

pub async fn join_match(storage: Arc<Storage>, user: &Option<String>, payload: &str) -> CliResult {
    let identity = resolve_identity(user)?;
    let decoded = codec::decode(payload)?;

    let service = VerificationService::new(storage);
    let result = service
        .verify(&VerificationClaim::new(
            &decoded.match_id,
            &decoded.secret,
            &identity.user_id,
        ))
        .await
        .map_err(Into::into);
    report_verification(result)
}

pub async fn verify_typed(
    storage: Arc<Storage>,
    user: &Option<String>,
    match_id: &str,
    code: &str,
) -> CliResult {
    let identity = resolve_identity(user)?;

    let service = VerificationService::new(storage);
    let result = service
        .verify(&VerificationClaim::new(match_id, code, &identity.user_id))
        .await
        .map_err(Into::into);
    report_verification(result)
}

pub async fn scan_frames(
    storage: Arc<Storage>,
    user: &Option<String>,
    frames_path: &Path,
) -> CliResult {
    let identity = resolve_identity(user)?;

    let script = if frames_path == Path::new("-") {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        tokio::fs::read_to_string(frames_path).await?
    };
    let frames: Vec<Option<String>> = script
        .lines()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(line.to_string())
            }
        })
        .collect();

    let camera = ScriptedCamera::new(frames);
    let (_cancel_tx, cancel_rx) = capture::cancellation();
    let outcome = CaptureLoop::new(camera)
        .with_frame_interval(Duration::from_millis(10))
        .run(cancel_rx)
        .await?;

    match outcome {
        CaptureOutcome::Decoded(payload) => {
            println!("Decoded code for match {}", payload.match_id);
            let service = VerificationService::new(storage);
            let result = service
                .verify(&VerificationClaim::new(
                    &payload.match_id,
                    &payload.secret,
                    &identity.user_id,
                ))
                .await
                .map_err(Into::into);
            report_verification(result)
        }
        CaptureOutcome::Cancelled => {
            println!("Scan cancelled.");
            Ok(())
        }
    }
}

pub async fn open_link(
    storage: Arc<Storage>,
    user: &Option<String>,
    data_dir: &Path,
    link: &str,
) -> CliResult {
    let auth: Box<dyn AuthProvider> = match user {
        Some(user) => Box::new(rallytag_core::StaticAuth::authenticated(user.clone())),
        None => Box::new(EnvAuth),
    };

    let mut flow = GuestEntryFlow::new(storage);
    match flow.open_link(link, auth.as_ref()).await {
        Ok(GuestOutcome::Verified(receipt)) => report_verification(Ok(receipt)),
        Ok(GuestOutcome::SignupRequired(pending)) => {
            let stash = pending_stash_path(data_dir);
            tokio::fs::write(&stash, pending.to_token()?).await?;
            println!("Nobody is signed in. Your verification was preserved.");
            println!(
                "Sign up or log in, then run: rallytag --user <you> resume"
            );
            Ok(())
        }
        Err(err) => report_verification(Err(err)),
    }
}

pub async fn resume_pending(
    storage: Arc<Storage>,
    user: &Option<String>,
    data_dir: &Path,
) -> CliResult {
    let identity = resolve_identity(user)?;

    let stash = pending_stash_path(data_dir);
    if !stash.exists() {
        println!("Nothing to resume.");
        return Ok(());
    }
    let token = tokio::fs::read_to_string(&stash).await?;
    let pending = PendingVerification::from_token(&token)?;

    let mut flow = GuestEntryFlow::with_pending(storage, pending);
    let result = flow.resume(&identity).await;
    // The intent is one-shot either way; drop the stash before reporting
    tokio::fs::remove_file(&stash).await?;

    match result {
        Ok(Some(receipt)) => report_verification(Ok(receipt)),
        Ok(None) => {
            println!("Nothing to resume.");
            Ok(())
        }
        Err(err) => report_verification(Err(err)),
    }
}

pub async fn show_status(storage: Arc<Storage>, match_id: &str) -> CliResult {
    let store = MatchStore::new(&storage);
    let record = match store.get_match(match_id).await? {
        Some(record) => record,
        None => {
            println!("No match with id {} exists.", match_id);
            return Ok(());
        }
    };

    println!(
        "{} match {} hosted by {}: {:?} ({}/{})",
        record.match_type,
        record.id,
        record.creator,
        record.status(),
        record.participants.len(),
        record.match_type.target_participants(),
    );

    if !record.participants.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["#", "User", "Joined at"]);
        for (i, p) in record.participants.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                p.user_id.clone(),
                p.joined_at.to_rfc3339(),
            ]);
        }
        println!("{table}");
    }

    Ok(())
}

pub async fn list_matches(storage: Arc<Storage>) -> CliResult {
    let store = MatchStore::new(&storage);
    let matches = store.list_matches().await?;

    if matches.is_empty() {
        println!("No matches stored.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Match", "Type", "Host", "Verified", "Status"]);
    for m in &matches {
        table.add_row(vec![
            m.id.clone(),
            m.match_type.to_string(),
            m.creator.clone(),
            format!(
                "{}/{}",
                m.participants.len(),
                m.match_type.target_participants()
            ),
            format!("{:?}", m.status()),
        ]);
    }
    println!("{table}");

    Ok(())
}
