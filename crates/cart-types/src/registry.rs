//! Registry trait for self-registering implementations.

/// Ties an implementation module to its configuration name and factory.
///
/// Storage backends and refund providers each expose a `Registry` struct
/// implementing this trait, so the service can map a name such as
/// `"memory"` under `[storage.implementations]` to the code that builds it.
pub trait ImplementationRegistry {
	/// Name of the implementation's table in the configuration file.
	const NAME: &'static str;

	/// Factory signature, defined by the owning crate.
	type Factory;

	fn factory() -> Self::Factory;
}
