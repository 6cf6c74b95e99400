//! Check command implementation.
//!
//! Validates configuration, environment and the restic repository.

use restic_exporter::aggregate::total_snapshot_count;
use restic_exporter::collector::SNAPSHOTS_ARGS;
use restic_exporter::invoker::{CommandInvoker, SystemInvoker};
use restic_exporter::snapshot::parse_groups;

use crate::config::{validate_effective_config, Config, ENV_REPOSITORY};
use crate::startup_checks::{check_env_value, check_executable};

/// Validates configuration, environment and one snapshot listing.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Restic Exporter - System Check");
    println!("==================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n🌐 Checking environment...");
    match check_env_value(ENV_REPOSITORY, std::env::var(ENV_REPOSITORY).ok().as_deref()) {
        Ok(()) => println!("   ✅ {} is set", ENV_REPOSITORY),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    let binary = config.effective_restic_binary();
    println!("\n📦 Checking restic executable...");
    match check_executable(binary) {
        Some(path) => println!("   ✅ {} resolves to {}", binary, path.display()),
        None => {
            println!("   ❌ {} not found", binary);
            all_ok = false;
        }
    }

    if all_ok {
        println!("\n📊 Listing snapshots...");
        let invoker = SystemInvoker::new(config.effective_command_timeout());
        match invoker.invoke(binary, &SNAPSHOTS_ARGS) {
            Ok(output) => match parse_groups(&output) {
                Ok(groups) => println!(
                    "   ✅ {} snapshots in {} groups",
                    total_snapshot_count(&groups),
                    groups.len()
                ),
                Err(e) => {
                    println!("   ❌ {}", e);
                    all_ok = false;
                }
            },
            Err(e) => {
                println!("   ❌ exit code {}: {}", e.exit_code(), e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        std::process::exit(1);
    }
}
