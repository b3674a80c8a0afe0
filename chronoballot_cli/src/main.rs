use chronoballot::*;
use clap::{App, AppSettings, Arg, SubCommand};
use std::process::exit;
use std::sync::Arc;

fn main() {
    env_logger::init();

    let app = App::new("Chronoballot")
        .version("0.1")
        .about("Chronoballot command-line voting client")
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(
            Arg::with_name("secrets")
                .long("secrets")
                .takes_value(true)
                .global(true)
                .help("Secrets file location - can also be set with CHRONOBALLOT_SECRETS"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate an identity keypair")
                .arg(
                    Arg::with_name("key-type")
                        .long("key-type")
                        .takes_value(true)
                        .possible_values(&["ed25519", "tezos"])
                        .default_value("ed25519")
                        .help("Key scheme"),
                ),
        )
        .subcommand(SubCommand::with_name("show-key").about("Print the stored public key"))
        .subcommand(
            SubCommand::with_name("join")
                .about("Join an election from an invitation")
                .arg(Arg::with_name("INVITATION").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("credential")
                .about("Post the eligibility credential (credential-generation phase)")
                .arg(Arg::with_name("INVITATION").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast a time-locked ballot (cast phase)")
                .arg(Arg::with_name("INVITATION").index(1).required(true))
                .arg(
                    Arg::with_name("choice")
                        .long("choice")
                        .takes_value(true)
                        .multiple(true)
                        .required(true)
                        .help("Choice index, repeatable for methods that take several"),
                ),
        )
        .subcommand(
            SubCommand::with_name("reveal")
                .about("Reveal the ballot decryption (tally phase)")
                .arg(Arg::with_name("INVITATION").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Show election progress")
                .arg(Arg::with_name("INVITATION").index(1).required(true)),
        );

    let matches = app.get_matches();
    let secrets_path = matches
        .value_of("secrets")
        .map(|s| s.to_string())
        .or_else(|| std::env::var("CHRONOBALLOT_SECRETS").ok())
        .unwrap_or_else(|| "secrets.json".to_string());

    match matches.subcommand() {
        ("keygen", Some(sub)) => command_keygen(&secrets_path, sub.value_of("key-type").unwrap()),
        ("show-key", Some(_)) => command_show_key(&secrets_path),
        ("join", Some(sub)) => command_join(&secrets_path, invitation_arg(sub)),
        ("credential", Some(sub)) => command_credential(&secrets_path, invitation_arg(sub)),
        ("vote", Some(sub)) => {
            let choices: Vec<usize> = sub
                .values_of("choice")
                .unwrap()
                .map(|c| {
                    c.parse().unwrap_or_else(|_| {
                        eprintln!("Bad choice index: {}", c);
                        exit(1);
                    })
                })
                .collect();
            command_vote(&secrets_path, invitation_arg(sub), &choices)
        }
        ("reveal", Some(sub)) => command_reveal(&secrets_path, invitation_arg(sub)),
        ("status", Some(sub)) => command_status(&secrets_path, invitation_arg(sub)),
        _ => {
            eprintln!("Unknown command");
            exit(1);
        }
    }
}

fn invitation_arg<'a>(sub: &'a clap::ArgMatches) -> &'a str {
    sub.value_of("INVITATION").unwrap()
}

fn unwrap_or_exit<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|err| {
        eprintln!("{}", err);
        exit(1);
    })
}

fn open_secrets(path: &str) -> FileSecretsManager {
    unwrap_or_exit(FileSecretsManager::open(path))
}

/// The process entry point owns the credential system; the election only
/// sees the trait object.
fn credential_system() -> Arc<dyn CredentialSystem> {
    Arc::new(MockCredentialSystem)
}

fn open_election(secrets_path: &str, invitation: &str) -> Election {
    unwrap_or_exit(Election::from_invitation(
        &Ctx::background(),
        invitation,
        Box::new(open_secrets(secrets_path)),
        credential_system(),
    ))
}

fn command_keygen(secrets_path: &str, key_type: &str) {
    let key_type = match key_type {
        "tezos" => KeyType::Tezos,
        _ => KeyType::Ed25519,
    };
    let secrets = open_secrets(secrets_path);
    if secrets.get_private_key().is_ok() {
        eprintln!("Secrets file already holds a key; refusing to overwrite");
        exit(1);
    }
    let private_key = unwrap_or_exit(PrivateKey::generate(key_type));
    unwrap_or_exit(secrets.set_private_key(&private_key));
    println!("{}", unwrap_or_exit(private_key.public().encode()));
}

fn command_show_key(secrets_path: &str) {
    let secrets = open_secrets(secrets_path);
    let private_key = unwrap_or_exit(secrets.get_private_key());
    println!("{}", unwrap_or_exit(private_key.public().encode()));
}

fn command_join(secrets_path: &str, invitation: &str) {
    let election = open_election(secrets_path, invitation);
    let params = election.params();
    println!("Joined: {}", params.title);
    if !params.description.is_empty() {
        println!("{}", params.description);
    }
    println!("Method: {}", params.voting_method);
    for (i, choice) in params.choices.iter().enumerate() {
        println!("  [{}] {}", i, choice);
    }
    println!("Phase: {:?}", election.phase());
}

fn command_credential(secrets_path: &str, invitation: &str) {
    let election = open_election(secrets_path, invitation);
    unwrap_or_exit(election.post_credential(&Ctx::background()));
    println!("Credential posted");
}

fn command_vote(secrets_path: &str, invitation: &str, choices: &[usize]) {
    let election = open_election(secrets_path, invitation);
    println!("Solving the time-lock puzzle; this takes a while by design...");
    unwrap_or_exit(election.vote(&Ctx::background(), choices));
    println!("Ballot posted");
}

fn command_reveal(secrets_path: &str, invitation: &str) {
    let election = open_election(secrets_path, invitation);
    unwrap_or_exit(election.reveal_ballot_decryption(&Ctx::background()));
    println!("Decryption revealed");
}

fn command_status(secrets_path: &str, invitation: &str) {
    let election = open_election(secrets_path, invitation);
    let progress = unwrap_or_exit(election.progress(&Ctx::background()));
    println!("Phase: {:?}", progress.phase);
    match progress.phase {
        ElectionPhase::Cast => {
            println!("Ballots cast: {} of {} credentialed voters", progress.count, progress.total)
        }
        ElectionPhase::Tally | ElectionPhase::End => {
            println!("Ballots decrypted: {} of {}", progress.count, progress.total)
        }
        _ => {}
    }
    if let Some(tally) = progress.tally {
        println!("Tally:");
        for (choice, count) in &tally {
            println!("  {}: {}", choice, count);
        }
    }
}
