/// Style instruction appended to every garment description.
pub const GARMENT_STYLE_INSTRUCTION: &str = "White background, flat lay or mannequin style, high quality, photorealistic.";

/// Instruction sent alongside the person and garment images.
pub const TRY_ON_INSTRUCTION: &str = "Generate a full-body photorealistic image of the person in the first image wearing the clothing from the second image. Maintain the person's pose, facial features, and background. Ensure the clothing fits naturally.";

/// Build the text part for a garment request.
///
/// Returns `None` when the description is blank.
pub fn garment_prompt(description: &str) -> Option<String> {
    let description = description.trim();
    if description.is_empty() {
        return None;
    }
    Some(format!(
        "Design a standalone piece of clothing: {}. {}",
        description, GARMENT_STYLE_INSTRUCTION
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garment_prompt_embeds_description() {
        let prompt = garment_prompt("  red silk gown ").unwrap();
        assert!(prompt.starts_with("Design a standalone piece of clothing: red silk gown."));
        assert!(prompt.ends_with(GARMENT_STYLE_INSTRUCTION));
    }

    #[test]
    fn test_garment_prompt_blank() {
        assert!(garment_prompt("").is_none());
        assert!(garment_prompt(" \n\t").is_none());
    }

    #[test]
    fn test_try_on_instruction_mentions_pose() {
        assert!(TRY_ON_INSTRUCTION.contains("pose"));
        assert!(TRY_ON_INSTRUCTION.contains("background"));
    }
}
