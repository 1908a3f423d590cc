use snafu::Snafu;

/// A generic, opaque error.
///
/// Collaborators (transports, metadata clients, tag lookups) report failures with this type, as the publisher never
/// needs to branch on their specific cause: it only logs them, or wraps them into a [`PublisherError`].
pub type GenericError = anyhow::Error;

/// Publisher construction errors.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum PublisherError {
    /// No region was given, and it could not be resolved from the instance metadata.
    #[snafu(display("Unable to obtain region: {}", source))]
    RegionUnavailable {
        /// Error source.
        source: GenericError,
    },

    /// The metrics transport could not be constructed for the resolved region.
    #[snafu(display("Unable to build metrics transport for region '{}': {}", region, source))]
    TransportUnavailable {
        /// Region the transport was being built for.
        region: String,

        /// Error source.
        source: GenericError,
    },
}
