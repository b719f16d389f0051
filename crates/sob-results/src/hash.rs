//! Content fingerprints of evaluated designs.

use sha2::{Digest, Sha256};
use sob_core::{DesignVector, Topology};

/// Hex sha256 over topology, mesh backend version and the exact design bits.
pub fn design_fingerprint(topology: Topology, design: &DesignVector, mesh_version: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(topology.id().to_le_bytes());
    hasher.update(mesh_version.to_le_bytes());
    hasher.update((design.len() as u64).to_le_bytes());
    for v in design.as_slice() {
        hasher.update(v.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        let x = DesignVector::new(vec![2.5, -1.0]);
        let a = design_fingerprint(Topology::StarBox, &x, 1);
        assert_eq!(a, design_fingerprint(Topology::StarBox, &x, 1));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let x = DesignVector::new(vec![2.5, -1.0]);
        let base = design_fingerprint(Topology::StarBox, &x, 1);
        assert_ne!(base, design_fingerprint(Topology::CrashTube, &x, 1));
        assert_ne!(base, design_fingerprint(Topology::StarBox, &x, 2));
        assert_ne!(
            base,
            design_fingerprint(Topology::StarBox, &DesignVector::new(vec![2.5, -1.0 + 1e-15]), 1)
        );
    }
}
