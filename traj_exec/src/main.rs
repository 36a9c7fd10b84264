//! Trajectory executable entry point.
//!
//! # Architecture
//!
//! The execution methodology consists of:
//!
//!     - Initialise the session, logger and parameters
//!     - Initialise the MidGen module and the network interfaces
//!     - Main loop:
//!         - Block until the perception stream delivers at least one
//!           observation, then drain everything queued into one batch
//!         - MidGen processing: reorder, diff, resume, step, merge, commit
//!         - Archive committed trajectory points as CSV
//!         - Save trajectory and boundary snapshots as JSON
//!         - Publish the telemetry packet
//!     - On end of stream, flush all pending trajectory points and exit

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use traj_lib::{
    mid_gen::{InputData, MidGen},
    per_client::{PerClient, PerClientError},
    tm_server::TmServer,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use comms_if::{
    net::NetParams,
    traj::{TrajPoint, TrajTm},
};
use log::{info, warn};
use serde::Serialize;

// Internal
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One committed trajectory point as archived to CSV.
#[derive(Serialize)]
struct CommittedRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("traj_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Trajectory Executable\n");
    info!(
        "Software root: {:?}",
        host::get_centerline_sw_root().wrap_err("Software root is not set")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut mid_gen = MidGen::default();
    mid_gen
        .init("mid_gen.toml", &session)
        .wrap_err("Failed to initialise MidGen")?;
    info!("MidGen init complete");

    let mut committed_archiver = Archiver::from_path(&session, "committed_trajectory.csv")
        .wrap_err("Failed to initialise the committed trajectory archive")?;

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let per_client =
        PerClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the PerClient")?;
    info!("PerClient initialised");

    let mut tm_server =
        TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // ---- DATA INPUT ----

        // Block for the next batch of observations
        let batch = match per_client.wait_batch() {
            Ok(b) => b,
            Err(PerClientError::RecvError(e)) => {
                warn!("Error recieving observations: {}, retrying", e);
                continue;
            }
            Err(e) => return Err(e).wrap_err("Perception stream failed"),
        };

        if batch.cones.is_empty() && !batch.end_of_stream {
            continue;
        }

        info!(
            "Batch of {} observation(s) recieved{}",
            batch.cones.len(),
            if batch.end_of_stream {
                ", stream ended"
            } else {
                ""
            }
        );

        // ---- MIDLINE PROCESSING ----

        let input = InputData::from_obs(&batch.cones, batch.end_of_stream);

        let (update, report) = match mid_gen.proc(&input) {
            Ok(res) => res,
            Err(e) => {
                // A failed batch leaves the retained state untouched, so
                // processing can continue with the next batch unless the
                // stream is already over
                if batch.end_of_stream {
                    return Err(e).wrap_err("Final batch processing failed");
                }
                warn!("Error during MidGen processing: {}", e);
                continue;
            }
        };

        info!(
            "Trajectory updated: {} reused, {} recomputed, {} committed, {} retained",
            report.reused_points,
            report.recomputed_points,
            report.committed_points,
            update.trajectory_m.len()
        );

        // ---- ARCHIVING ----

        for point in &update.committed_m {
            let record = CommittedRecord {
                time_s: session::get_elapsed_seconds(),
                x_m: point.x,
                y_m: point.y,
            };
            if let Err(e) = committed_archiver.serialise(record) {
                warn!("Could not archive committed trajectory point: {}", e);
            }
        }

        session::save_with_timestamp("traj/trajectory.json", update.trajectory_m.clone());
        session::save_with_timestamp(
            "windows/boundaries.json",
            (
                update.right_boundary_m.clone(),
                update.left_boundary_m.clone(),
            ),
        );

        // ---- TELEMETRY ----

        let tm = TrajTm {
            batch_count: mid_gen.batch_count(),
            committed_m: to_traj_points(&update.committed_m),
            trajectory_m: to_traj_points(&update.trajectory_m),
            right_boundary_m: to_traj_points(&update.right_boundary_m),
            left_boundary_m: to_traj_points(&update.left_boundary_m),
        };
        match tm_server.send(&tm) {
            Ok(_) => (),
            Err(e) => warn!("TmServer error: {}", e),
        }

        // ---- SHUTDOWN ----

        if batch.end_of_stream {
            info!("End of observation stream, all pending points flushed");
            break;
        }
    }

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Convert engine points into telemetry points.
fn to_traj_points(points: &[nalgebra::Point2<f64>]) -> Vec<TrajPoint> {
    points.iter().map(|p| TrajPoint::new(p.x, p.y)).collect()
}
