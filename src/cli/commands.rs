//! Command handlers for the apprepo CLI
//!
//! Each handler resolves the contexts it needs, performs its work against
//! the repository or destination API, and cleans up any resources the
//! resolution created. Cleanup failures are logged and never override the
//! command's own result.

use indicatif::{ProgressBar, ProgressStyle};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{info, warn};
use url::Url;

use crate::cli::{
    CreateDestinationArgs, DeleteArgs, DestinationsAction, DestinationsArgs, GetArgs, InfoArgs,
    ListArgs, PushArgs,
};
use crate::config::Session;
use crate::constants::env as env_names;
use crate::constants::services;
use crate::destination::{Destination, DestinationClient, Level};
use crate::errors::{AppError, ConfigError, PlatformError, RepoError, Result};
use crate::platform::models::ServiceInstance;
use crate::platform::{
    build_client, CacheFile, ContextCache, ContextResolver, PlatformClient, RepoContext,
};
use crate::repo::{RepoClient, TransferEngine};

/// Everything a command needs before touching the platform: the resolved
/// session, a context resolver, and the persisted cache when enabled.
struct CommandContext {
    session: Session,
    resolver: ContextResolver,
    engine: TransferEngine,
    cache_file: CacheFile,
    cache: ContextCache,
}

impl CommandContext {
    fn open() -> Result<Self> {
        let session = Session::from_env()?;
        let http = build_client(&session.tls)?;
        let api_url = Url::parse(&session.api_url).map_err(|_| ConfigError::InvalidUrl {
            name: env_names::API_URL,
            value: session.api_url.clone(),
        })?;
        let platform = PlatformClient::new(http.clone(), api_url, session.api_token.clone());
        let resolver = ContextResolver::new(
            platform,
            session.tls.clone(),
            session.org_id.clone(),
            session.space_id.clone(),
        );
        let cache_file = CacheFile::default_path()?;
        let cache = if session.cache_enabled {
            cache_file.load()
        } else {
            ContextCache::new()
        };
        Ok(Self {
            session,
            resolver,
            engine: TransferEngine::new(http),
            cache_file,
            cache,
        })
    }

    /// Resolve the repository runtime context, through the cache when
    /// enabled.
    async fn repo_context(&mut self) -> Result<RepoContext> {
        let cache = if self.session.cache_enabled {
            Some(&mut self.cache)
        } else {
            None
        };
        self.resolver
            .resolve_repo(
                &self.session.service_name,
                services::RUNTIME_PLAN,
                None,
                self.session.runtime_url_override.as_deref(),
                cache,
            )
            .await
    }

    /// Release the resources a repository resolution created. With the
    /// cache enabled the context is kept for the next invocation instead.
    async fn finish_repo(&self, context: &RepoContext) {
        if self.session.cache_enabled {
            if let Err(err) = self.cache_file.flush(&self.cache) {
                warn!("could not persist context cache: {err}");
            }
            return;
        }
        if let Err(err) = self.resolver.teardown_repo(context).await {
            warn!("cleanup of resolved context failed: {err}");
        }
    }
}

fn repo_client(context: &RepoContext, http: &reqwest::Client) -> Result<RepoClient> {
    let base = context
        .key
        .credentials
        .uri
        .as_deref()
        .ok_or(RepoError::MissingServiceUrl)?;
    Ok(RepoClient::new(
        http.clone(),
        base,
        context.access_token.clone(),
    ))
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "CHANGED")]
    changed: String,
    #[tabled(rename = "DEFAULT")]
    is_default: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "ETAG")]
    etag: String,
}

/// Handle the list command: all applications, or the files of one.
pub async fn handle_list(args: ListArgs) -> Result<()> {
    let mut ctx = CommandContext::open()?;
    let context = ctx.repo_context().await?;
    let result = list_inner(&ctx, &context, &args).await;
    ctx.finish_repo(&context).await;
    result
}

async fn list_inner(ctx: &CommandContext, context: &RepoContext, args: &ListArgs) -> Result<()> {
    let client = repo_client(context, ctx.resolver.platform().http())?;

    let Some(app) = &args.app else {
        let applications = client.list_applications(args.app_host.as_deref()).await?;
        if applications.is_empty() {
            println!("No applications found");
            return Ok(());
        }
        let rows = applications
            .into_iter()
            .map(|app| ApplicationRow {
                name: app.name,
                version: app.version,
                changed: app.changed_on.unwrap_or_default(),
                is_default: if app.is_default { "yes" } else { "" }.to_string(),
            })
            .collect();
        print_table(rows);
        return Ok(());
    };

    let paths = client.list_files(app, args.app_host.as_deref()).await?;
    if paths.is_empty() {
        println!("Application '{app}' has no files");
        return Ok(());
    }
    let fetched = ctx
        .engine
        .fetch_metadata(
            client.base(),
            &context.access_token,
            args.app_host.as_deref(),
            &paths,
        )
        .await;

    let mut rows = Vec::with_capacity(fetched.len());
    for fetch in fetched {
        let meta = fetch.result?;
        rows.push(FileRow {
            path: fetch.path,
            size: meta.length.to_string(),
            etag: meta.etag,
        });
    }
    print_table(rows);
    Ok(())
}

/// Handle the get command: download all files of one application.
pub async fn handle_get(args: GetArgs) -> Result<()> {
    let mut ctx = CommandContext::open()?;
    let context = ctx.repo_context().await?;
    let result = get_inner(&ctx, &context, &args).await;
    ctx.finish_repo(&context).await;
    result
}

async fn get_inner(ctx: &CommandContext, context: &RepoContext, args: &GetArgs) -> Result<()> {
    let client = repo_client(context, ctx.resolver.platform().http())?;
    let paths = client
        .list_files(&args.app, args.app_host.as_deref())
        .await?;
    if paths.is_empty() {
        println!("Application '{}' has no files", args.app);
        return Ok(());
    }
    info!("downloading {} files of '{}'", paths.len(), args.app);

    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let fetched = ctx
        .engine
        .fetch_contents(
            client.base(),
            &context.access_token,
            args.app_host.as_deref(),
            &paths,
        )
        .await;

    let mut first_error = None;
    let mut written = 0usize;
    for fetch in fetched {
        progress.inc(1);
        match fetch.result {
            Ok(bytes) => {
                let target = args.out.join(fetch.path.trim_start_matches('/'));
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&target, bytes)?;
                written += 1;
            }
            Err(err) => {
                warn!("download of {} failed: {err}", fetch.path);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    progress.finish_and_clear();

    match first_error {
        Some(err) => Err(err.into()),
        None => {
            println!("Downloaded {written} files to {}", args.out.display());
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct InfoRow {
    #[tabled(rename = "APP-HOST")]
    app_host: String,
    #[tabled(rename = "SIZE LIMIT")]
    size_limit: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

/// Handle the info command: repository metadata per app-host instance.
pub async fn handle_info(args: InfoArgs) -> Result<()> {
    if args.app_hosts.is_empty() {
        return Err(AppError::generic("At least one --app-host GUID is required"));
    }
    let mut ctx = CommandContext::open()?;
    let context = ctx.repo_context().await?;
    let result = info_inner(&ctx, &context, &args).await;
    ctx.finish_repo(&context).await;
    result
}

async fn info_inner(ctx: &CommandContext, context: &RepoContext, args: &InfoArgs) -> Result<()> {
    let client = repo_client(context, ctx.resolver.platform().http())?;
    let mut rows = Vec::with_capacity(args.app_hosts.len());
    for app_host in &args.app_hosts {
        let meta = client.service_meta(Some(app_host)).await?;
        rows.push(InfoRow {
            app_host: app_host.clone(),
            size_limit: meta
                .size_limit
                .map(|limit| limit.to_string())
                .unwrap_or_default(),
            status: meta.status.unwrap_or_default(),
        });
    }
    print_table(rows);
    Ok(())
}

/// Handle the push command: upload archives to an app-host instance.
///
/// The app-host instance is the product of the push and is kept even when
/// it was provisioned here; the key used for the upload is removed
/// afterwards.
pub async fn handle_push(args: PushArgs) -> Result<()> {
    for archive in &args.archives {
        if !archive.is_file() {
            return Err(AppError::generic(format!(
                "Archive {} does not exist",
                archive.display()
            )));
        }
    }

    let ctx = CommandContext::open()?;
    let context = ctx
        .resolver
        .resolve_repo(
            &ctx.session.service_name,
            services::APP_HOST_PLAN,
            args.app_host_name.as_deref(),
            ctx.session.runtime_url_override.as_deref(),
            None,
        )
        .await?;

    let result = push_inner(&ctx, &context, &args).await;

    if let Err(err) = ctx
        .resolver
        .teardown(&context.key.guid, false, &context.instance.guid)
        .await
    {
        warn!("cleanup of upload key failed: {err}");
    }

    result.map(|()| {
        println!(
            "Uploaded {} archive(s) to app-host '{}' ({})",
            args.archives.len(),
            context.instance.name,
            context.instance.guid
        );
    })
}

async fn push_inner(ctx: &CommandContext, context: &RepoContext, args: &PushArgs) -> Result<()> {
    let client = repo_client(context, ctx.resolver.platform().http())?;
    info!(
        "uploading {} archive(s) to instance '{}'",
        args.archives.len(),
        context.instance.name
    );
    client.upload(&args.archives, None).await?;
    Ok(())
}

/// Handle the delete command: remove app-host instances with their keys
/// and optionally their destinations, or only the content they serve.
pub async fn handle_delete(args: DeleteArgs) -> Result<()> {
    if args.app_hosts.is_empty() && args.names.is_empty() {
        return Err(AppError::generic(
            "At least one app-host GUID or --name is required",
        ));
    }

    let ctx = CommandContext::open()?;
    let mut guids = args.app_hosts.clone();
    if !args.names.is_empty() {
        let instances = ctx
            .resolver
            .plan_instances(&ctx.session.service_name, services::APP_HOST_PLAN)
            .await?;
        for name in &args.names {
            guids.extend(matching_instance_guids(&instances, name)?);
        }
    }

    if args.content {
        delete_instance_content(&ctx, &guids).await
    } else {
        delete_instances(&ctx, &guids, args.destination).await
    }
}

/// GUIDs of the instances a name selects. A trailing '*' selects every
/// instance whose name starts with the prefix; anything else must match
/// one instance exactly.
fn matching_instance_guids(instances: &[ServiceInstance], name: &str) -> Result<Vec<String>> {
    if let Some(prefix) = name.strip_suffix('*') {
        return Ok(instances
            .iter()
            .filter(|instance| instance.name.starts_with(prefix))
            .map(|instance| instance.guid.clone())
            .collect());
    }
    instances
        .iter()
        .find(|instance| instance.name == name)
        .map(|instance| vec![instance.guid.clone()])
        .ok_or_else(|| {
            AppError::from(PlatformError::InstanceNotFound {
                name: name.to_string(),
            })
        })
}

/// Wipe the served content of each instance through a short-lived key.
async fn delete_instance_content(ctx: &CommandContext, guids: &[String]) -> Result<()> {
    for guid in guids {
        let (key, token) = ctx.resolver.ephemeral_key(guid).await?;
        let result: Result<()> = async {
            let base = key
                .credentials
                .uri
                .as_deref()
                .ok_or(RepoError::MissingServiceUrl)?;
            let client = RepoClient::new(ctx.resolver.platform().http().clone(), base, token);
            client.delete_content(guid).await?;
            Ok(())
        }
        .await;
        if let Err(err) = ctx.resolver.platform().delete_key(&key.guid).await {
            warn!("cleanup of content-delete key failed: {err}");
        }
        result?;
        println!("Deleted content of app-host {guid}");
    }
    Ok(())
}

/// Delete each instance together with all of its keys, cleaning up linked
/// destinations first when requested.
async fn delete_instances(
    ctx: &CommandContext,
    guids: &[String],
    with_destinations: bool,
) -> Result<()> {
    if with_destinations {
        delete_linked_destinations(ctx, guids).await?;
    }
    for guid in guids {
        for key in ctx.resolver.platform().list_keys(guid).await? {
            info!("deleting service key {} of instance {guid}", key.guid);
            ctx.resolver.platform().delete_key(&key.guid).await?;
        }
        match ctx.resolver.platform().delete_instance(guid).await {
            Ok(()) => println!("Deleted app-host instance {guid}"),
            // After destination cleanup a missing instance is reported,
            // not fatal.
            Err(err) if with_destinations => {
                warn!("instance {guid} was not deleted: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Delete subaccount destinations that point at any of the instances, plus
/// destinations grouped under the same logical service as a deleted one.
async fn delete_linked_destinations(ctx: &CommandContext, guids: &[String]) -> Result<()> {
    let context = ctx
        .resolver
        .resolve_destination(
            services::DESTINATION_SERVICE,
            services::DESTINATION_PLAN,
            None,
        )
        .await?;
    let client = DestinationClient::new(
        ctx.resolver.platform().http().clone(),
        context.service_url.clone(),
        context.access_token.clone(),
    );

    let result: Result<()> = async {
        let destinations = client.list(Level::Subaccount).await?;
        for name in linked_destination_names(&destinations, guids) {
            // Another record may have removed it already.
            if client.get(Level::Subaccount, &name).await?.is_some() {
                client.delete(Level::Subaccount, &name).await?;
                println!("Deleted destination '{name}'");
            }
        }
        Ok(())
    }
    .await;

    if let Err(err) = ctx.resolver.teardown_destination(&context).await {
        warn!("cleanup of destination context failed: {err}");
    }
    result
}

/// Names of the destinations linked to the given instances: direct matches
/// on the app-host property, then everything sharing a logical-service
/// property with one of those.
fn linked_destination_names(destinations: &[Destination], guids: &[String]) -> Vec<String> {
    let mut doomed = Vec::new();
    let mut cloud_services = Vec::new();
    for destination in destinations {
        let Some(host) = destination.extra.get(services::APP_HOST_PROPERTY) else {
            continue;
        };
        if guids.iter().any(|guid| guid == host.trim()) {
            doomed.push(destination.name.clone());
            if let Some(service) = destination.extra.get(services::CLOUD_SERVICE_PROPERTY) {
                cloud_services.push(service.clone());
            }
        }
    }
    for destination in destinations {
        if let Some(service) = destination.extra.get(services::CLOUD_SERVICE_PROPERTY) {
            if cloud_services.contains(service) && !doomed.contains(&destination.name) {
                doomed.push(destination.name.clone());
            }
        }
    }
    doomed
}

#[derive(Tabled)]
struct DestinationRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    destination_type: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "AUTHENTICATION")]
    authentication: String,
    #[tabled(rename = "PROXY")]
    proxy_type: String,
}

/// Handle the destinations command group.
pub async fn handle_destinations(args: DestinationsArgs) -> Result<()> {
    let ctx = CommandContext::open()?;
    let context = ctx
        .resolver
        .resolve_destination(
            services::DESTINATION_SERVICE,
            services::DESTINATION_PLAN,
            args.instance.as_deref(),
        )
        .await?;
    let level = if args.instance.is_some() {
        Level::Instance
    } else {
        Level::Subaccount
    };
    let client = DestinationClient::new(
        ctx.resolver.platform().http().clone(),
        context.service_url.clone(),
        context.access_token.clone(),
    );

    let result = match &args.action {
        DestinationsAction::List => destinations_list(&client, level).await,
        DestinationsAction::Create(create) => destinations_create(&client, level, create).await,
        DestinationsAction::Delete { name } => {
            client.delete(level, name).await?;
            println!("Deleted destination '{name}'");
            Ok(())
        }
    };

    if let Err(err) = ctx.resolver.teardown_destination(&context).await {
        warn!("cleanup of destination context failed: {err}");
    }
    result
}

async fn destinations_list(client: &DestinationClient, level: Level) -> Result<()> {
    let destinations = client.list(level).await?;
    if destinations.is_empty() {
        println!("No destinations found");
        return Ok(());
    }
    let rows = destinations
        .into_iter()
        .map(|destination| DestinationRow {
            name: destination.name,
            destination_type: destination.destination_type.unwrap_or_default(),
            url: destination.url.unwrap_or_default(),
            authentication: destination.authentication.unwrap_or_default(),
            proxy_type: destination.proxy_type.unwrap_or_default(),
        })
        .collect();
    print_table(rows);
    Ok(())
}

async fn destinations_create(
    client: &DestinationClient,
    level: Level,
    args: &CreateDestinationArgs,
) -> Result<()> {
    let extras = args.extra_properties().map_err(AppError::generic)?;
    let destination = Destination {
        name: args.name.clone(),
        destination_type: Some(args.destination_type.clone()),
        url: Some(args.url.clone()),
        authentication: Some(args.authentication.clone()),
        proxy_type: Some(args.proxy_type.clone()),
        extra: extras.into_iter().collect(),
    };
    client.create(level, &destination).await?;
    println!("Created destination '{}'", args.name);
    Ok(())
}
