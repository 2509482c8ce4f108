use eyre::Context;
use std::io::IsTerminal;
use std::path::Path;
use tokio_stream::StreamExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_api_access::{SessionExpired, YouTubeClient, establish_session, oauth::OAuthManager};

/// Example playlist:
/// <https://www.youtube.com/playlist?list=PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI>
const DEMO_PLAYLIST: &str = "PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI";

const SESSION_FILE: &str = "session.json";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    // Client IDs and secrets are generated on Google's Dev Console.
    let client_id = std::env::var("YOUTUBE_OAUTH_CLIENT_ID")
        .context("read YOUTUBE_OAUTH_CLIENT_ID environment variable")?;
    let client_secret = std::env::var("YOUTUBE_OAUTH_CLIENT_SECRET")
        .context("read YOUTUBE_OAUTH_CLIENT_SECRET environment variable")?;
    let playlist_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEMO_PLAYLIST.to_string());

    let oauth = OAuthManager::new(client_id, client_secret);
    let session_path = Path::new(SESSION_FILE);

    let mut attempted_reauth = false;
    loop {
        let (_session, yt) = establish_session(&oauth, session_path).await?;
        match dump_playlist(&yt, &playlist_id).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is::<SessionExpired>() && !attempted_reauth => {
                // The session file is already gone; one fresh trip through
                // the consent flow before giving up.
                tracing::warn!("session expired mid-run, re-running consent flow");
                attempted_reauth = true;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetches every page of the playlist and dumps the accumulated result.
///
/// The human-readable listing goes to stderr; the JSON dump of all items
/// goes to stdout. The dump stands in for a real view layer.
async fn dump_playlist(yt: &YouTubeClient, playlist_id: &str) -> eyre::Result<()> {
    let channels = yt.list_my_channels();
    let mut channels = std::pin::pin!(channels);
    while let Some(channel) = channels.next().await {
        let channel = channel.context("fetch channel")?;
        eprintln!("==> {} ({})", channel.snippet.title, channel.id);
    }

    eprintln!("==> playlist {playlist_id}");

    let items = yt.list_playlist_items(playlist_id);
    let mut items = std::pin::pin!(items);
    let mut all = Vec::new();
    while let Some(item) = items.next().await {
        let item = item.context("fetch playlist item")?;
        eprintln!("{:>4}. {}", item.snippet.position + 1, item.snippet.title);
        all.push(item);
    }

    // Demo video metadata API on the first item that refers to a video
    if let Some(video_id) = all
        .iter()
        .find_map(|item| item.snippet.resource_id.video_id.as_deref())
    {
        let video = yt
            .get_video_metadata(video_id)
            .await
            .context("fetch video metadata")?;
        let stats = &video.statistics;
        eprintln!("==> video {} ({})", video.snippet.title, video.id);
        eprintln!("  Views: {}", stats.view_count.as_deref().unwrap_or("N/A"));
        eprintln!("  Likes: {}", stats.like_count.as_deref().unwrap_or("N/A"));
        eprintln!(
            "  Comments: {}",
            stats.comment_count.as_deref().unwrap_or("N/A")
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&all).context("serialize results")?
    );

    Ok(())
}
