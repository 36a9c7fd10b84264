//! # Simulated Perception Executable
//!
//! This executable stands in for the vehicle's perception stack during
//! development of the trajectory software. It grows a synthetic cone track
//! section by section and publishes the cones as side-labelled observations
//! at an irregular pace, with some cones dropped and some delivered out of
//! order, just like the real detector would.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Perception stream server abstraction.
mod per_server;

/// Synthetic track generation.
mod track_gen;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use nalgebra::Point2;
use structopt::StructOpt;

// Internal
use comms_if::{
    net::NetParams,
    per::{ConeObs, PerMsg, Side},
};
use per_server::PerServer;
use track_gen::TrackGen;
use util::{
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// CLI OPTIONS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "per_exec", about = "Simulated perception executable")]
struct Opt {
    /// Number of track sections to publish before ending the stream.
    /// Unlimited if not given.
    #[structopt(long)]
    sections: Option<u64>,

    /// Offset into the noise field driving track generation, acts as the
    /// seed for a reproducible run.
    #[structopt(long, default_value = "0.0")]
    noise_offset: f64,

    /// Minimum delay between published cones in milliseconds.
    #[structopt(long, default_value = "50")]
    min_delay_ms: u64,

    /// Maximum delay between published cones in milliseconds.
    #[structopt(long, default_value = "500")]
    max_delay_ms: u64,

    /// Override the perception endpoint from net.toml.
    #[structopt(long)]
    endpoint: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("per_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Simulated Perception Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    let opt = Opt::from_args();
    info!("Options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    let endpoint = opt
        .endpoint
        .clone()
        .unwrap_or_else(|| net_params.per_endpoint.clone());

    info!("Parameters loaded");

    // ---- SERVER INITIALISATION ----

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let server = PerServer::new(&zmq_ctx, &endpoint)
        .wrap_err("Failed to initialise the perception server")?;

    info!("Server initialised on {}", endpoint);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, publishing track sections\n");

    let mut track_gen = TrackGen::new(opt.noise_offset);
    let mut sections_published = 0u64;

    loop {
        let section = track_gen.next_section();
        info!(
            "Generated {:?} with {} cone pairs",
            section.kind,
            section.right.len()
        );

        session::save_with_timestamp("track/section.json", section.clone());

        // Model detection misses and out-of-order delivery
        let mut right = track_gen.thin(&section.right);
        let mut left = track_gen.thin(&section.left);
        track_gen.permute_pairs(&mut right);
        track_gen.permute_pairs(&mut left);

        publish_cones(&server, &mut track_gen, &opt, right, left);

        sections_published += 1;

        if let Some(limit) = opt.sections {
            if sections_published >= limit {
                info!("Published {} sections, ending the stream", sections_published);
                match server.publish(&PerMsg::EndOfStream) {
                    Ok(_) => (),
                    Err(e) => warn!("Could not publish the end of stream marker: {}", e),
                }
                break;
            }
        }
    }

    // ---- SHUTDOWN ----

    session.exit();

    info!("End of execution");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Publish a section's cones, alternating sides at random and pacing each
/// message with a noise-driven delay.
fn publish_cones(
    server: &PerServer,
    track_gen: &mut TrackGen,
    opt: &Opt,
    right: Vec<Point2<f64>>,
    left: Vec<Point2<f64>>,
) {
    let mut right = right.into_iter().peekable();
    let mut left = left.into_iter().peekable();

    while right.peek().is_some() || left.peek().is_some() {
        let take_right = if right.peek().is_none() {
            false
        }
        else if left.peek().is_none() {
            true
        }
        else {
            track_gen.coin()
        };

        let (side, point) = if take_right {
            // The unwrap here is safe since peek returned Some
            (Side::Right, right.next().unwrap())
        }
        else {
            (Side::Left, left.next().unwrap())
        };

        let obs = ConeObs {
            side,
            x_m: point.x,
            y_m: point.y,
        };

        match server.publish(&PerMsg::Cone(obs)) {
            Ok(_) => info!("Published {:?} cone at ({:.2}, {:.2})", side, point.x, point.y),
            Err(e) => warn!("Could not publish cone: {}", e),
        }

        let delay_ms =
            track_gen.uniform((opt.min_delay_ms as f64, opt.max_delay_ms as f64));
        std::thread::sleep(std::time::Duration::from_millis(delay_ms as u64));
    }
}
