use chrono::Local;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use taskdeck::error::ClientError;
use taskdeck::filter::{urgency, TaskFilter, Urgency};
use taskdeck::model::{MemberId, Task, TaskDraft, TaskId, TaskPatch, TaskStatus, TeamId, User};
use taskdeck::notice::Notice;
use taskdeck::persist::CredentialFile;
use taskdeck::settings::{Settings, SETTINGS_FILENAME};
use taskdeck::{ApiClient, BoardError, BoardScope, BoardSession, Intent, Session, Slot, TeamRoster};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Task boards from the command line")]
struct Args {
    /// Settings file.
    #[arg(long, default_value = SETTINGS_FILENAME)]
    settings: String,

    /// Overrides `api_base_url` from the settings file.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    /// Show the signed-in profile.
    Me,
    /// Show a board.
    Board {
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Add a task.
    Add {
        title: String,
        #[arg(long)]
        team: Option<TeamId>,
        #[arg(long, default_value = "todo")]
        status: TaskStatus,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Edit a task's fields.
    Edit {
        id: TaskId,
        #[arg(long)]
        team: Option<TeamId>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Move a task to another column (or position).
    Move {
        id: TaskId,
        #[arg(long)]
        to: TaskStatus,
        /// Position in the destination column; defaults to the end.
        #[arg(long)]
        index: Option<usize>,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Delete a task.
    Rm {
        id: TaskId,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Every task you can see, across boards.
    Tasks {
        #[arg(long, default_value = "all")]
        filter: TaskFilter,
    },
    Teams,
    TeamCreate {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Members { team: TeamId },
    Invite { team: TeamId, username: String },
    RemoveMember { team: TeamId, member: MemberId },
    TeamDelete { team: TeamId },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match Settings::from_path(&args.settings) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    match run(args, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Notice::error(e.message()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(settings.log_filter.as_deref().unwrap_or("taskdeck=info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args, settings: Settings) -> Result<(), ClientError> {
    // ── Session + client ───────────────────────────────────────
    let session = Session::restore(CredentialFile::open(&settings.credential_file)?)?;
    let base_url = args.base_url.unwrap_or(settings.api_base_url);
    let api = ApiClient::new(base_url, session.clone());

    match args.command {
        // ── Auth ───────────────────────────────────────────────
        Command::Register { username, password } => {
            let user = api.register(&username, &password).await?;
            println!("{}", Notice::success(format!("registered and signed in as {}", user.username)));
        }
        Command::Login { username, password } => {
            let user = api.login(&username, &password).await?;
            println!("{}", Notice::success(format!("signed in as {}", user.username)));
        }
        Command::Logout => {
            api.logout();
            println!("{}", Notice::success("signed out"));
        }
        Command::Me => {
            let user = api.me().await?;
            let since = user
                .created_at
                .map(|t| format!("  member since {}", t.format("%Y-%m-%d")))
                .unwrap_or_default();
            println!("#{} {} {}{since}", user.id, user.username, user.email.unwrap_or_default());
        }

        // ── Board ──────────────────────────────────────────────
        Command::Board { team } => {
            let board = open_board(&api, team).await?;
            print_board(&board);
        }
        Command::Add { title, team, status, description, assignee } => {
            let me = signed_in(&session)?;
            let draft = TaskDraft {
                title,
                description,
                status,
                assignee: assignee.unwrap_or(me.username),
                due_date: None,
            };
            let intent = Intent::Create { column: status, draft };
            run_intent(&api, team, intent).await?;
        }
        Command::Edit { id, team, title, description, assignee } => {
            let patch = TaskPatch { title, description, assignee, ..TaskPatch::default() };
            run_intent(&api, team, Intent::Update { task_id: id, patch }).await?;
        }
        Command::Move { id, to, index, team } => {
            let mut board = open_board(&api, team).await?;
            let source = board
                .store()
                .slot_of(id)
                .ok_or(BoardError::TaskNotFound(id))?;
            let index = index.unwrap_or_else(|| board.store().column(to).task_ids.len());
            let intent = Intent::Move { task_id: id, source, destination: Some(Slot::new(to, index)) };
            finish(&mut board, intent).await?;
        }
        Command::Rm { id, team } => {
            run_intent(&api, team, Intent::Delete { task_id: id }).await?;
        }
        Command::Tasks { filter } => {
            let tasks = api.all_tasks().await?;
            let now = Local::now().naive_local();
            for task in filter.apply(&tasks, now) {
                print_task_line(task, urgency(task, now));
            }
        }

        // ── Teams ──────────────────────────────────────────────
        Command::Teams => {
            let roster = roster(&api, &session).await?;
            for team in roster.teams() {
                let owner = team.created_by.as_ref().map(|u| u.username.as_str()).unwrap_or("?");
                println!(
                    "#{:<4} {}  (owner {owner})  {}",
                    team.id,
                    team.name,
                    team.description.as_deref().unwrap_or("")
                );
            }
        }
        Command::TeamCreate { name, description } => {
            let mut roster = roster(&api, &session).await?;
            println!("{}", roster.create_team(&api, &name, &description).await?);
        }
        Command::Members { team } => {
            let mut roster = roster(&api, &session).await?;
            roster.select(&api, team).await?;
            for m in roster.members() {
                println!("#{:<4} {:<16} {}", m.id, m.user.username, m.role);
            }
        }
        Command::Invite { team, username } => {
            let mut roster = roster(&api, &session).await?;
            roster.select(&api, team).await?;
            println!("{}", roster.invite(&api, &username).await?);
        }
        Command::RemoveMember { team, member } => {
            let mut roster = roster(&api, &session).await?;
            roster.select(&api, team).await?;
            println!("{}", roster.remove_member(&api, member).await?);
        }
        Command::TeamDelete { team } => {
            let mut roster = roster(&api, &session).await?;
            roster.select(&api, team).await?;
            println!("{}", roster.delete_team(&api, team).await?);
        }
    }
    Ok(())
}

fn signed_in(session: &Session) -> Result<User, ClientError> {
    session
        .user()
        .ok_or_else(|| ClientError::Validation("not signed in; run `taskdeck login` first".into()))
}

async fn roster(api: &ApiClient, session: &Session) -> Result<TeamRoster, ClientError> {
    let me = signed_in(session)?;
    let mut roster = TeamRoster::new(me.id);
    roster.load(api).await?;
    Ok(roster)
}

async fn open_board(api: &ApiClient, team: Option<TeamId>) -> Result<BoardSession, ClientError> {
    let me = signed_in(api.session())?;
    let scope = match team {
        Some(team_id) => BoardScope::Team { team_id, user_id: me.id },
        None => BoardScope::Personal { user_id: me.id },
    };
    Ok(BoardSession::open(api.clone(), scope).await?)
}

async fn run_intent(api: &ApiClient, team: Option<TeamId>, intent: Intent) -> Result<(), ClientError> {
    let mut board = open_board(api, team).await?;
    finish(&mut board, intent).await
}

/// Apply one intent, wait for its request, report, and show the board.
async fn finish(board: &mut BoardSession, intent: Intent) -> Result<(), ClientError> {
    board.submit(intent)?;
    board.settle().await;
    for notice in board.take_notices() {
        eprintln!("{notice}");
    }
    print_board(board);
    Ok(())
}

// ── Rendering ──────────────────────────────────────────────────

fn print_board(board: &BoardSession) {
    let now = Local::now().naive_local();
    for column in board.store().columns() {
        println!("== {} ({})", column.title, column.task_ids.len());
        let tasks = board.store().column_tasks(column.id);
        if tasks.is_empty() {
            println!("   (no tasks)");
        }
        for task in tasks {
            print_task_line(task, urgency(task, now));
        }
    }
}

fn print_task_line(task: &Task, urgency: Urgency) {
    let flag = match urgency {
        Urgency::Overdue => "!! ",
        Urgency::DueWithinDay => "!  ",
        Urgency::DueSoon => ".  ",
        Urgency::None => "   ",
    };
    let due = task
        .due_date
        .map(|d| format!(" (due {})", d.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    let assignee = if task.assignee.is_empty() {
        String::new()
    } else {
        format!(" @{}", task.assignee)
    };
    println!("{flag}[#{}] {} [{}]{assignee}{due}", task.id, task.title, task.status);
}
