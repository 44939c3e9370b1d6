//! CLI handlers that drive a running service.
//!
//! This module handles terminal presentation only; the service does the work.

use anyhow::Result;

use super::args::{AddCliArgs, AdjustCliArgs, StatusCliArgs};
use super::client::FleetClient;
use crate::api::routes::bots::{AddBotsRequest, AdjustBotsRequest};

pub async fn handle_status_command(client: &FleetClient, args: StatusCliArgs) -> Result<()> {
    if let Some(meeting_id) = args.meeting {
        let detail = client.meeting(&meeting_id).await?;
        println!(
            "Meeting {}: {} bots ({} video / {} desired, {} non-video / {} desired)",
            detail.meeting_id,
            detail.status.active_bots,
            detail.status.active_video_bots,
            detail.status.desired_video_bots,
            detail.status.active_non_video_bots,
            detail.status.desired_non_video_bots,
        );
        if detail.pending_video_launches + detail.pending_non_video_launches > 0 {
            println!(
                "Joining: {} video, {} non-video",
                detail.pending_video_launches, detail.pending_non_video_launches
            );
        }
        for p in &detail.participants {
            println!(
                "  bot{:<4} camera={:<5} mic={:<5} joined {}  {}",
                p.ordinal,
                p.camera_enabled,
                p.mic_enabled,
                p.joined_at.format("%H:%M:%S"),
                p.id
            );
        }
        return Ok(());
    }

    let status = client.status().await?;
    if status.is_empty() {
        println!("No meetings.");
        return Ok(());
    }

    println!(
        "{:<24} {:>6} {:>14} {:>18}",
        "MEETING", "BOTS", "VIDEO", "NON-VIDEO"
    );
    for (meeting_id, s) in status {
        println!(
            "{:<24} {:>6} {:>14} {:>18}",
            meeting_id,
            s.active_bots,
            format!("{}/{}", s.active_video_bots, s.desired_video_bots),
            format!("{}/{}", s.active_non_video_bots, s.desired_non_video_bots),
        );
    }
    Ok(())
}

pub async fn handle_add_command(client: &FleetClient, args: AddCliArgs) -> Result<()> {
    let request = AddBotsRequest {
        meeting_id: args.meeting_id.clone(),
        desired_video_bots: Some(args.video),
        desired_non_video_bots: Some(args.non_video),
        enable_audio_for_first_bot: args.audio,
    };
    client.add_bots(&request).await?;
    println!(
        "Meeting {}: requested {} video and {} non-video bots",
        args.meeting_id, args.video, args.non_video
    );
    Ok(())
}

pub async fn handle_adjust_command(client: &FleetClient, args: AdjustCliArgs) -> Result<()> {
    let request = AdjustBotsRequest {
        meeting_id: args.meeting_id.clone(),
        desired_video_bots: args.video,
        desired_non_video_bots: args.non_video,
    };
    let response = client.adjust_bots(&request).await?;
    if response.get("known").and_then(|v| v.as_bool()) == Some(false) {
        println!("Meeting {} is not known; nothing changed", args.meeting_id);
    } else {
        println!("Meeting {} adjusted", args.meeting_id);
    }
    Ok(())
}
