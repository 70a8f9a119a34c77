//! Traitement du signal en arithmétique entière
//!
//! Ce module regroupe les petites briques DSP de l'assistant : calcul du
//! niveau RMS pour la détection vocale, sous-échantillonnage 2:1 de la
//! capture et gain de lecture. Tout reste en entier (sauf le gain) pour
//! coller au comportement d'un traitement embarqué temps réel.

/// Calcule le niveau RMS d'un bloc d'échantillons i16
///
/// La racine carrée est calculée par la méthode de Babylone en arithmétique
/// entière, amorcée à la moyenne des carrés. C'est exactement le niveau
/// comparé aux seuils de détection vocale.
///
/// # Example
/// ```
/// use audio::dsp::rms_energy;
///
/// let samples = [100i16; 960];
/// assert_eq!(rms_energy(&samples), 100);
/// assert_eq!(rms_energy(&[]), 0);
/// ```
pub fn rms_energy(samples: &[i16]) -> u32 {
    if samples.is_empty() {
        return 0;
    }

    let sum_squares: u64 = samples
        .iter()
        .map(|&s| (s as i64 * s as i64) as u64)
        .sum();
    let mean = (sum_squares / samples.len() as u64) as u32;

    if mean == 0 {
        return 0;
    }

    // Racine carrée entière, méthode de Babylone
    let mut x = mean;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + mean / x) / 2;
    }
    x
}

/// Calcule le niveau RMS directement sur du PCM i16 little-endian
pub fn rms_energy_bytes(pcm: &[u8]) -> u32 {
    if pcm.len() < 2 {
        return 0;
    }

    let sample_count = pcm.len() / 2;
    let sum_squares: u64 = pcm
        .chunks_exact(2)
        .map(|pair| {
            let s = i16::from_le_bytes([pair[0], pair[1]]) as i64;
            (s * s) as u64
        })
        .sum();
    let mean = (sum_squares / sample_count as u64) as u32;

    if mean == 0 {
        return 0;
    }

    let mut x = mean;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + mean / x) / 2;
    }
    x
}

/// Sous-échantillonne du PCM i16 little-endian d'un facteur 2
///
/// Garde un échantillon sur deux (48 kHz → 24 kHz), sans filtrage.
/// Le buffer de sortie est réutilisé d'un appel à l'autre : il est vidé
/// puis rempli, sans réallocation tant que sa capacité suffit.
pub fn downsample_half(input: &[u8], output: &mut Vec<u8>) {
    output.clear();
    for pair in input.chunks_exact(4) {
        output.extend_from_slice(&pair[..2]);
    }
}

/// Applique un gain sur du PCM i16 little-endian, en place
///
/// Utilisé par le lecteur juste avant l'écriture vers le périphérique.
/// Le résultat est borné à la plage i16 pour éviter tout wrap.
pub fn apply_gain(pcm: &mut [u8], gain: f32) {
    for pair in pcm.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let scaled = (sample as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        pair.copy_from_slice(&scaled.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_constant_signal() {
        // Signal constant à 100 → moyenne des carrés 10000 → RMS 100
        let samples = [100i16; 960];
        assert_eq!(rms_energy(&samples), 100);

        // Le signe ne change rien au niveau
        let samples = [-200i16; 960];
        assert_eq!(rms_energy(&samples), 200);
    }

    #[test]
    fn test_rms_silence() {
        assert_eq!(rms_energy(&[]), 0);
        assert_eq!(rms_energy(&[0i16; 480]), 0);
    }

    #[test]
    fn test_rms_integer_sqrt_rounding() {
        // Moyenne des carrés = 2 → racine entière = 1
        let samples: Vec<i16> = vec![1, -1, 2, 0];
        // carrés: 1 + 1 + 4 + 0 = 6, moyenne = 1, racine = 1
        assert_eq!(rms_energy(&samples), 1);
    }

    #[test]
    fn test_rms_bytes_matches_samples() {
        let samples = [347i16; 240];
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        assert_eq!(rms_energy_bytes(&pcm), rms_energy(&samples));
    }

    #[test]
    fn test_downsample_keeps_every_other_sample() {
        // 4 échantillons: 10, 20, 30, 40 → on garde 10 et 30
        let mut input = Vec::new();
        for s in [10i16, 20, 30, 40] {
            input.extend_from_slice(&s.to_le_bytes());
        }

        let mut output = Vec::new();
        downsample_half(&input, &mut output);

        assert_eq!(output.len(), 4);
        assert_eq!(i16::from_le_bytes([output[0], output[1]]), 10);
        assert_eq!(i16::from_le_bytes([output[2], output[3]]), 30);
    }

    #[test]
    fn test_downsample_reuses_buffer() {
        let input = vec![0u8; 3840];
        let mut output = Vec::new();

        downsample_half(&input, &mut output);
        assert_eq!(output.len(), 1920);
        let capacity = output.capacity();

        // Un second appel ne doit pas réallouer
        downsample_half(&input, &mut output);
        assert_eq!(output.len(), 1920);
        assert_eq!(output.capacity(), capacity);
    }

    #[test]
    fn test_apply_gain() {
        let mut pcm = Vec::new();
        for s in [1000i16, -1000, 0] {
            pcm.extend_from_slice(&s.to_le_bytes());
        }

        apply_gain(&mut pcm, 0.5);

        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 500);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), -500);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), 0);
    }

    #[test]
    fn test_apply_gain_clamps() {
        let mut pcm = i16::MAX.to_le_bytes().to_vec();
        apply_gain(&mut pcm, 2.0);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), i16::MAX);
    }
}
