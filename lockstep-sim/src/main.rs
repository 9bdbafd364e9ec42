use clap::Parser;

fn main() -> anyhow::Result<()> {
    let options = lockstep_sim::options::SimOptions::try_parse()?;

    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let stats = lockstep_sim::simulate(&options)?;

    log::info!(
        "Run ended with {:?} at t = {} after {} steps.",
        stats.finish_state,
        stats.end_time,
        stats.num_steps
    );

    Ok(())
}
