use crate::crypto::DigestAlgorithm;
use digest::Digest;
use sha2::{Sha256, Sha384, Sha512};

pub fn digest_slices<I, T>(alg: DigestAlgorithm, slices: I) -> Box<[u8]>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    fn digest_with<D: Digest, I: IntoIterator<Item = T>, T: AsRef<[u8]>>(slices: I) -> Box<[u8]> {
        let mut hasher = D::new();
        for bytes in slices {
            hasher.update(bytes.as_ref());
        }
        Box::from(&hasher.finalize()[..])
    }

    match alg {
        DigestAlgorithm::Sha256 => digest_with::<Sha256, _, _>(slices),
        DigestAlgorithm::Sha384 => digest_with::<Sha384, _, _>(slices),
        DigestAlgorithm::Sha512 => digest_with::<Sha512, _, _>(slices),
    }
}

pub fn digest(alg: DigestAlgorithm, bytes: &[u8]) -> Box<[u8]> {
    digest_slices(alg, [bytes])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_known_values() {
        assert_eq!(
            hex::encode(digest(DigestAlgorithm::Sha256, b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex::encode(digest(DigestAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest(DigestAlgorithm::Sha384, b"abc").len(), 48);
        assert_eq!(digest(DigestAlgorithm::Sha512, b"abc").len(), 64);
    }

    #[test]
    fn digest_slices_concatenates() {
        assert_eq!(
            digest_slices(DigestAlgorithm::Sha256, [&b"a"[..], b"b", b"c"]),
            digest(DigestAlgorithm::Sha256, b"abc")
        );
    }
}
