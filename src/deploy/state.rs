// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce the stage order at compile time.

/// Session open, nothing done yet.
/// Available actions: `synchronize()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Connected;

/// Source tree mirrored to the host.
/// Available actions: `provision()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronized;

/// Runtimes and tools present.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Provisioned;

/// Every sub-project built.
/// Available actions: `install_services()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Built;

/// Units written, systemd reloaded, units enabled, proxy active.
/// Available actions: `restart()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ServicesInstalled;

/// Services restarted.
/// Available actions: `health_check()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Restarted;

/// Health checks have run.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthChecked;
