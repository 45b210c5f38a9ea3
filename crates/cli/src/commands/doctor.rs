//! `issuespilot doctor`: Diagnose configuration and connectivity.

use issuespilot_core::VectorIndex;

use super::{CommandResult, ConfigSource};

pub async fn run(source: &ConfigSource) -> CommandResult {
    println!("🩺 IssuesPilot Doctor — System Diagnostics");
    println!("==========================================\n");

    let mut issues = 0;

    let config = match source.load() {
        Ok(config) => {
            println!("  ✅ Configuration loaded");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    match config.require_query_settings() {
        Ok(()) => println!("  ✅ All required variables set"),
        Err(e) => {
            println!("  ⚠️  {e}");
            issues += 1;
        }
    }

    // Vector store
    match super::connect_index(&config) {
        Ok(index) => match index.heartbeat().await {
            Ok(_) => {
                println!("  ✅ Vector store reachable at {}", index.base_url());
                if let Ok(name) = config.require_collection() {
                    match index.count(name).await {
                        Ok(count) => println!("  ✅ Collection '{name}' holds {count} chunks"),
                        Err(e) => {
                            println!("  ⚠️  Collection '{name}': {e}");
                            issues += 1;
                        }
                    }
                }
            }
            Err(e) => {
                println!("  ❌ Vector store: {e} — start it with `issuespilot db-server`");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Vector store not configured: {e}");
            issues += 1;
        }
    }

    // LLM provider
    match issuespilot_providers::build_llm(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ LLM provider '{}' reachable", config.llm.provider),
            Ok(false) => {
                println!("  ⚠️  LLM provider '{}' answered but is not healthy", config.llm.provider);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ LLM provider '{}': {e}", config.llm.provider);
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ LLM provider not configured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
