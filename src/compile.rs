// src/compile.rs
//
// Compiles source text into a generator (mono or polyphonic).
//
// This is the bridge between the editor's source text and a runnable
// unit. The metadata of a first (monophonic) compile decides the path; a
// polyphonic source is then compiled again for the voice-allocating path.
// Every call owns the artifacts it creates.

use std::rc::Rc;

use log::debug;

use crate::error::{CompileError, InstantiateError};
use crate::host::{AudioClock, CompiledArtifact, DspCompiler, GeneratorKind, RuntimeUnit};
use crate::metadata::CompiledMetadata;

/// Pick the instantiation path from compiled metadata.
///
/// A declared voice count above zero selects the polyphonic path with that
/// many voices. Anything else is monophonic.
pub fn select_generator(metadata: &CompiledMetadata) -> GeneratorKind {
    match u32::try_from(metadata.voice_count) {
        Ok(voices) if voices > 0 => GeneratorKind::Poly { voices },
        _ => GeneratorKind::Mono,
    }
}

/// One compiled artifact and the metadata it reported.
pub struct CompiledUnit {
    artifact: Box<dyn CompiledArtifact>,
    metadata: CompiledMetadata,
}

impl CompiledUnit {
    fn from_artifact(artifact: Box<dyn CompiledArtifact>) -> Result<Self, CompileError> {
        let metadata = CompiledMetadata::from_json(artifact.metadata_json())?;
        Ok(Self { artifact, metadata })
    }

    pub fn metadata(&self) -> &CompiledMetadata {
        &self.metadata
    }
}

/// A compiled unit bound to its instantiation path.
///
/// The path is fixed for the lifetime of the generator; changing it takes a
/// new compile.
pub enum Generator {
    Mono(CompiledUnit),
    Poly(CompiledUnit, u32),
}

impl Generator {
    /// Compile `source`, reading its metadata to choose the path.
    pub async fn compile(
        compiler: &dyn DspCompiler,
        name: &str,
        source: &str,
        flags: &str,
    ) -> Result<Self, CompileError> {
        let mono = compiler.compile(GeneratorKind::Mono, name, source, flags).await?;
        let mono = CompiledUnit::from_artifact(mono)?;

        match select_generator(&mono.metadata) {
            GeneratorKind::Mono => {
                debug!("'{name}' compiled for the mono path");
                Ok(Generator::Mono(mono))
            }
            kind @ GeneratorKind::Poly { voices } => {
                debug!("'{name}' declares {voices} voices, recompiling for the poly path");
                let artifact = compiler.compile(kind, name, source, flags).await?;
                Ok(Generator::Poly(CompiledUnit::from_artifact(artifact)?, voices))
            }
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        match self {
            Generator::Mono(_) => GeneratorKind::Mono,
            Generator::Poly(_, voices) => GeneratorKind::Poly { voices: *voices },
        }
    }

    fn unit(&self) -> &CompiledUnit {
        match self {
            Generator::Mono(unit) | Generator::Poly(unit, _) => unit,
        }
    }

    pub fn metadata(&self) -> &CompiledMetadata {
        self.unit().metadata()
    }

    /// Create a fresh runtime unit on this generator's path.
    pub async fn instantiate(
        &self,
        clock: &dyn AudioClock,
    ) -> Result<Rc<dyn RuntimeUnit>, InstantiateError> {
        match self {
            Generator::Mono(unit) => unit.artifact.instantiate(clock, None).await,
            Generator::Poly(unit, voices) => unit.artifact.instantiate(clock, Some(*voices)).await,
        }
    }
}
