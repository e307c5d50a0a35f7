//! CLI commands

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use katara_core::geo::route_url;
use katara_core::{CapabilityBridge, CapabilityOutcome, ClientConfig, GeocodeCache, Route, StateDir};
use katara_http::client::points::coordinates_of;
use katara_http::client::{
    ArcGisGeocoder, FileTokenStore, Gateway, KataraClient, OutgoingMessage, ProfileUpdate,
    RecognitionRequest, filter_points, resolve_missing_coordinates,
};
use katara_http::types::{ChatMessage, Point, RegisterRequest};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config;
use crate::host::CliHost;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, register and recover accounts
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Forget the stored session
    Logout,

    /// Show the API, session and cache in use
    Status,

    /// Show the signed-in profile
    Me,

    /// Edit the profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Talk to the assistant
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },

    /// Ask what an item is and how to dispose of it
    Recognize {
        /// Photo of the item
        #[arg(long)]
        image: PathBuf,

        /// Question to send with the photo
        #[arg(long)]
        question: Option<String>,
    },

    /// Recycling drop-off points
    Points {
        #[command(subcommand)]
        command: PointsCommands,
    },

    /// Write to the team
    Contact {
        /// Message text
        #[arg(long)]
        message: String,

        /// Reply-to address
        #[arg(long)]
        email: Option<String>,
    },

    /// Terms of use and privacy policy
    Legal {
        #[command(subcommand)]
        command: LegalCommands,
    },

    /// Local settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show where a `#/view` link leads and which commands serve it
    Open {
        /// Link fragment, such as `#/points`
        fragment: String,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with an email or username
    Login {
        /// Email or username
        #[arg(long)]
        identifier: String,

        #[arg(long, env = "KATARA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account; a verification code is emailed
    Register {
        #[arg(long)]
        email: String,

        #[arg(long)]
        username: String,

        #[arg(long, env = "KATARA_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        bio: String,
    },

    /// Confirm an email address with the emailed code
    Verify {
        #[arg(long)]
        email: String,

        #[arg(long)]
        code: String,
    },

    /// Send a new verification code
    Resend {
        #[arg(long)]
        email: String,
    },

    /// Email a password reset code
    Forgot {
        #[arg(long)]
        email: String,
    },

    /// Set a new password with the emailed code
    Reset {
        #[arg(long)]
        email: String,

        #[arg(long)]
        code: String,

        /// New password
        #[arg(long, env = "KATARA_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Change username, bio or avatar
    Update {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        /// Avatar image
        #[arg(long)]
        avatar: Option<PathBuf>,
    },

    /// Change the password
    Password {
        #[arg(long)]
        current: String,

        #[arg(long = "new")]
        new_password: String,
    },
}

#[derive(Subcommand)]
pub enum ChatCommands {
    /// List chats
    List,

    /// Start a chat
    New {
        /// Chat title
        title: Option<String>,
    },

    /// Show the messages of a chat
    Show { chat_id: i64 },

    /// Send a message
    Send {
        /// Target chat; the default chat when omitted
        #[arg(long = "chat")]
        chat_id: Option<i64>,

        /// Message text
        #[arg(long, default_value = "")]
        text: String,

        /// Photo to attach
        #[arg(long)]
        image: Option<PathBuf>,

        /// Share a position with this message
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Show the default chat
    History,
}

#[derive(Subcommand)]
pub enum PointsCommands {
    /// List every drop-off point
    List {
        /// Only points whose name, address, category or notes match
        #[arg(long)]
        search: Option<String>,
    },

    /// Points closest to a position
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// How many points to show
        #[arg(short = 'k', long, default_value = "5")]
        limit: usize,

        /// Rank the full list locally instead of asking the server
        #[arg(long)]
        local: bool,
    },

    /// Show the map settings published by the server
    MapConfig,
}

#[derive(Subcommand)]
pub enum LegalCommands {
    Terms,
    Privacy,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Set the backend URL
    SetApi { url: String },

    /// Set the ArcGIS key used to geocode points; empty disables it
    SetArcgisKey { key: String },

    /// Delete the geocode cache
    ClearCache,
}

/// Everything a command runs against
pub struct Context {
    state_dir: StateDir,
    config: ClientConfig,
    client: KataraClient,
    bridge: CapabilityBridge,
}

impl Context {
    pub fn open(state_dir: StateDir, api_override: Option<&str>) -> Result<Self> {
        let config = config::load(&state_dir, api_override)?;
        let session = FileTokenStore::open(state_dir.session_path()).into_session();
        let gateway = Gateway::new(config.api_base.clone(), session)?;
        debug!("Using API at {}", gateway.base_url());

        Ok(Self {
            state_dir,
            config,
            client: KataraClient::new(gateway),
            bridge: CapabilityBridge::new(),
        })
    }
}

impl Commands {
    /// View the command belongs to
    pub const fn route(&self) -> Route {
        match self {
            Commands::Auth { .. } => Route::Auth,
            Commands::Me | Commands::Profile { .. } => Route::Profile,
            Commands::Chat { .. } => Route::Chat,
            Commands::Recognize { .. } => Route::Recognition,
            Commands::Points { .. } => Route::Points,
            Commands::Contact { .. } | Commands::Legal { .. } => Route::About,
            Commands::Logout
            | Commands::Status
            | Commands::Config { .. }
            | Commands::Open { .. } => Route::Settings,
        }
    }

    pub async fn execute(self, state_dir: StateDir, api_override: Option<String>) -> Result<()> {
        // Settings edits must not depend on the settings file parsing
        let ctx = match self {
            Commands::Config { command } => {
                return command.execute(&state_dir, api_override.as_deref());
            }
            _ => Context::open(state_dir, api_override.as_deref())?,
        };

        let route = self.route();
        let target = route.guard(ctx.client.is_authenticated());
        if target != route {
            debug!("Redirecting {route} to {target}");
            return match target {
                Route::Auth => Err(anyhow!(
                    "You are not signed in. Run `katara auth login` first."
                )),
                _ => {
                    println!("Already signed in. Run `katara logout` to switch accounts.");
                    Ok(())
                }
            };
        }

        match self {
            Commands::Auth { command } => command.execute(&ctx).await,
            Commands::Logout => {
                ctx.client.logout()?;
                println!("Signed out.");
                Ok(())
            }
            Commands::Status => {
                show_status(&ctx);
                Ok(())
            }
            Commands::Me => show_profile(&ctx).await,
            Commands::Profile { command } => command.execute(&ctx).await,
            Commands::Chat { command } => command.execute(&ctx).await,
            Commands::Recognize { image, question } => recognize(&ctx, image, question).await,
            Commands::Points { command } => command.execute(&ctx).await,
            Commands::Contact { message, email } => {
                let whatsapp = ctx.client.contact(email.as_deref(), &message).await?;
                println!("Message sent. Thank you!");
                if let Some(link) = whatsapp {
                    println!("You can also reach us on WhatsApp: {link}");
                }
                Ok(())
            }
            Commands::Legal { command } => {
                let document = match command {
                    LegalCommands::Terms => ctx.client.terms().await?,
                    LegalCommands::Privacy => ctx.client.privacy().await?,
                };
                println!("{}\n\n{}", document.title, document.content);
                Ok(())
            }
            Commands::Open { fragment } => {
                let requested = Route::from_fragment(&fragment);
                let target = requested.guard(ctx.client.is_authenticated());
                if target != requested {
                    println!("{requested} redirects to {target}");
                }
                println!("{}: {}", target.fragment(), view_commands(target));
                Ok(())
            }
            Commands::Config { .. } => unreachable!("config commands run without a context"),
        }
    }
}

impl AuthCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let client = &ctx.client;
        match self {
            AuthCommands::Login {
                identifier,
                password,
            } => {
                client.login(&identifier, &password).await?;
                println!("Welcome back!");
            }
            AuthCommands::Register {
                email,
                username,
                password,
                bio,
            } => {
                let response = client
                    .register(RegisterRequest {
                        email: email.trim().to_string(),
                        username: username.trim().to_string(),
                        password,
                        bio,
                    })
                    .await?;
                if client.is_authenticated() {
                    println!("Account created. You are signed in.");
                } else {
                    println!(
                        "{}",
                        response
                            .message
                            .as_deref()
                            .unwrap_or("Account created. Check your email for the code.")
                    );
                    println!("Then run `katara auth verify --email {email} --code <code>`.");
                }
            }
            AuthCommands::Verify { email, code } => {
                client.verify_email(&email, &code).await?;
                println!("Email verified. You are signed in.");
            }
            AuthCommands::Resend { email } => {
                let response = client.resend_verification(&email).await?;
                println!(
                    "{}",
                    response.message.as_deref().unwrap_or("We sent you a new code.")
                );
            }
            AuthCommands::Forgot { email } => {
                let response = client.forgot_password(&email).await?;
                println!(
                    "{}",
                    response
                        .message
                        .as_deref()
                        .unwrap_or("If the account exists, a reset code is on its way.")
                );
            }
            AuthCommands::Reset {
                email,
                code,
                password,
            } => {
                if client.reset_password(&email, &code, &password).await? {
                    println!("Password updated. You are signed in.");
                } else {
                    println!("Password updated. You can now log in.");
                }
            }
        }
        Ok(())
    }
}

impl ProfileCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            ProfileCommands::Update {
                username,
                bio,
                avatar,
            } => {
                let avatar = match avatar {
                    Some(path) => {
                        let host = CliHost::new(Some(path), None, None);
                        granted_or_notice(ctx.bridge.pick_image(&host).await, "Avatar not changed")
                    }
                    None => None,
                };
                ctx.client
                    .update_profile(&ProfileUpdate {
                        username,
                        bio,
                        avatar,
                    })
                    .await?;
                println!("Profile updated.");
            }
            ProfileCommands::Password {
                current,
                new_password,
            } => {
                ctx.client.change_password(&current, &new_password).await?;
                println!("Password changed.");
            }
        }
        Ok(())
    }
}

impl ChatCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let client = &ctx.client;
        match self {
            ChatCommands::List => {
                let chats = client.list_chats().await?;
                if chats.is_empty() {
                    println!("No chats yet. Start one with `katara chat new`.");
                }
                for chat in chats {
                    println!("{:>5}  {}", chat.id, chat.title);
                }
            }
            ChatCommands::New { title } => {
                let chat_id = client.create_chat(title.as_deref().unwrap_or("")).await?;
                println!("Created chat {chat_id}.");
            }
            ChatCommands::Show { chat_id } => print_messages(&client.messages(chat_id).await?),
            ChatCommands::History => print_messages(&client.default_history().await?),
            ChatCommands::Send {
                chat_id,
                text,
                image,
                lat,
                lon,
            } => {
                let host = CliHost::new(image, lat, lon);
                let mut message = OutgoingMessage::text(text);
                if host.wants_image()
                    && let Some(image) =
                        granted_or_notice(ctx.bridge.pick_image(&host).await, "Photo not attached")
                {
                    message = message.with_image(image);
                }
                if host.wants_location()
                    && let Some(location) = granted_or_notice(
                        ctx.bridge.current_location(&host).await,
                        "Location not shared",
                    )
                {
                    message = message.with_location(location);
                }

                let response = match chat_id {
                    Some(chat_id) => client.send_message(chat_id, &message).await?,
                    None => client.send_default_message(&message).await?,
                };
                println!("{}", response.reply);
            }
        }
        Ok(())
    }
}

impl PointsCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            PointsCommands::List { search } => {
                let points = load_points(ctx).await?;
                let shown = filter_points(&points, search.as_deref().unwrap_or(""));
                if shown.is_empty() {
                    println!("No points match.");
                }
                for point in shown {
                    print_point(point, None);
                }
            }
            PointsCommands::Nearest {
                lat,
                lon,
                limit,
                local,
            } => {
                let host = CliHost::new(None, Some(lat), Some(lon));
                let origin = match ctx.bridge.current_location(&host).await {
                    CapabilityOutcome::Granted(origin) => origin,
                    CapabilityOutcome::Denied(reason) => bail!("Location unavailable: {reason}"),
                };

                if local {
                    let points = load_points(ctx).await?;
                    let mut ranked: Vec<(f64, &Point)> = points
                        .iter()
                        .filter_map(|p| coordinates_of(p).map(|c| (origin.distance_km(&c), p)))
                        .collect();
                    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
                    for (distance, point) in ranked.into_iter().take(limit) {
                        print_point(point, Some(distance));
                    }
                } else {
                    for nearest in ctx.client.nearest_points(origin, limit).await? {
                        print_point(&nearest.point, nearest.distance_km);
                    }
                }
            }
            PointsCommands::MapConfig => {
                let map = ctx.client.map_config().await?;
                println!("provider: {}", map.provider);
                println!("api key:  {}", config::masked_key(&map.api_key));
                println!("basemap:  {}", map.basemap_url);
                println!("tiles:    {}", map.tiles);
            }
        }
        Ok(())
    }
}

impl ConfigCommands {
    fn execute(self, state_dir: &StateDir, api_override: Option<&str>) -> Result<()> {
        match self {
            ConfigCommands::Show => {
                let effective = config::load(state_dir, api_override)?;
                println!("api base:   {}", effective.api_base);
                println!("arcgis key: {}", config::masked_key(&effective.arcgis_api_key));
                println!("settings:   {}", state_dir.settings_path().display());
            }
            ConfigCommands::SetApi { url } => {
                let settings = config::set_api_base(state_dir, &url)?;
                info!("API base set to {}", settings.api_base);
                println!("API base set to {}.", settings.api_base);
            }
            ConfigCommands::SetArcgisKey { key } => {
                let settings = config::set_arcgis_key(state_dir, &key)?;
                if settings.geocoding_enabled() {
                    println!("ArcGIS key saved. Points without coordinates will be geocoded.");
                } else {
                    println!("ArcGIS key removed. Geocoding is off.");
                }
            }
            ConfigCommands::ClearCache => {
                let entries = config::clear_cache(state_dir)?;
                println!("Map cache cleared ({entries} addresses).");
            }
        }
        Ok(())
    }
}

fn show_status(ctx: &Context) {
    let cache = GeocodeCache::load(ctx.state_dir.geocode_cache_path());
    println!("api:        {}", ctx.client.gateway().base_url());
    println!(
        "signed in:  {}",
        if ctx.client.is_authenticated() { "yes" } else { "no" }
    );
    println!("session:    {}", ctx.state_dir.session_path().display());
    println!(
        "geocoding:  {}",
        if ctx.config.geocoding_enabled() { "on" } else { "off" }
    );
    println!("map cache:  {} addresses", cache.len());
}

/// Commands that serve a view
const fn view_commands(route: Route) -> &'static str {
    match route {
        Route::Auth => "katara auth login | register | verify | forgot | reset",
        Route::Home | Route::Chat => "katara chat history | list | new | show | send",
        Route::Recognition => "katara recognize --image <photo>",
        Route::Points => "katara points list | nearest | map-config",
        Route::Profile => "katara me, katara profile update | password",
        Route::Settings => "katara status | logout | config",
        Route::About => "katara contact | legal terms | legal privacy",
    }
}

async fn show_profile(ctx: &Context) -> Result<()> {
    let profile = ctx.client.me().await?;
    println!("{} <{}>", profile.username, profile.email);
    if !profile.is_verified {
        println!("(email not verified)");
    }
    if !profile.bio.is_empty() {
        println!("{}", profile.bio);
    }
    if let Some(avatar) = profile.avatar_url {
        println!("avatar: {avatar}");
    }
    Ok(())
}

async fn recognize(ctx: &Context, image: PathBuf, question: Option<String>) -> Result<()> {
    let host = CliHost::new(Some(image), None, None);
    let image = granted_or_notice(ctx.bridge.pick_image(&host).await, "Photo not attached");
    let response = ctx
        .client
        .recognize(RecognitionRequest { image, question })
        .await?;
    println!("{}", response.reply);
    Ok(())
}

/// Points from the server, with missing coordinates filled in when possible
async fn load_points(ctx: &Context) -> Result<Vec<Point>> {
    let mut points = ctx.client.list_points().await?;
    if ctx.config.geocoding_enabled() {
        let mut cache = GeocodeCache::load(ctx.state_dir.geocode_cache_path());
        let geocoder = ArcGisGeocoder::new(ctx.config.arcgis_api_key.clone());
        if let Err(e) = resolve_missing_coordinates(&mut points, &mut cache, &geocoder).await {
            warn!("Could not save the geocode cache: {e}");
        }
    }
    Ok(points)
}

fn granted_or_notice<T>(outcome: CapabilityOutcome<T>, notice: &str) -> Option<T> {
    match outcome {
        CapabilityOutcome::Granted(value) => Some(value),
        CapabilityOutcome::Denied(reason) => {
            eprintln!("{notice}: {reason}");
            None
        }
    }
}

fn print_messages(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages yet.");
    }
    for message in messages {
        let who = if message.is_user() { "you" } else { "katara" };
        println!("[{}] {who}:", message.created_at);
        println!("{}", message.content);
        if let Some(image) = &message.image_url {
            println!("(image: {image})");
        }
        println!();
    }
}

fn print_point(point: &Point, distance_km: Option<f64>) {
    match distance_km {
        Some(distance) => println!("{}  ({distance:.2} km)", point.name),
        None => println!("{}", point.name),
    }
    println!("    {}", point.address);
    if let Some(category) = &point.category {
        println!("    {category}");
    }
    if let Some(notes) = point.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("    {notes}");
    }
    println!("    {}", route_url(&point.address));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_routes() {
        assert_eq!(Commands::Status.route(), Route::Settings);
        assert_eq!(Commands::Me.route(), Route::Profile);
        assert_eq!(
            Commands::Chat {
                command: ChatCommands::List
            }
            .route(),
            Route::Chat
        );
        assert_eq!(
            Commands::Legal {
                command: LegalCommands::Terms
            }
            .route(),
            Route::About
        );
    }

    #[test]
    fn test_signed_out_commands() {
        let allowed = |command: Commands| {
            let route = command.route();
            route.guard(false) == route
        };
        assert!(allowed(Commands::Logout));
        assert!(allowed(Commands::Config {
            command: ConfigCommands::Show
        }));
        assert!(allowed(Commands::Auth {
            command: AuthCommands::Forgot {
                email: "a@b.com".into()
            }
        }));
        assert!(allowed(Commands::Open {
            fragment: "#/chat".into()
        }));
        assert!(!allowed(Commands::Me));
        assert!(!allowed(Commands::Points {
            command: PointsCommands::MapConfig
        }));
    }

    #[test]
    fn test_links_resolve_to_serving_commands() {
        let open = |fragment: &str, authenticated: bool| {
            let target = Route::from_fragment(fragment).guard(authenticated);
            (target.fragment(), view_commands(target))
        };

        assert_eq!(
            open("#/points", true),
            ("#/points", "katara points list | nearest | map-config")
        );
        assert_eq!(open("#/points", false).0, "#/auth");
        assert_eq!(open("#/auth", true).0, "#/");
        assert_eq!(open("#/about", false).0, "#/about");
        assert!(open("#/nowhere", true).1.starts_with("katara chat"));
    }

    #[tokio::test]
    async fn test_config_commands_repair_broken_settings() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());
        std::fs::create_dir_all(state_dir.config_dir()).unwrap();
        std::fs::write(state_dir.settings_path(), "{ not json").unwrap();
        assert!(config::load(&state_dir, None).is_err());

        Commands::Config {
            command: ConfigCommands::SetApi {
                url: "http://localhost:8000".into(),
            },
        }
        .execute(StateDir::with_override(temp_dir.path()), None)
        .await
        .unwrap();

        let repaired = config::load(&state_dir, None).unwrap();
        assert_eq!(repaired.api_base, "http://localhost:8000");
    }
}
