//! Builds the system and user prompts sent to vision providers.
//!
//! Prompt text is considered part of the observable contract with the AI
//! providers, not an implementation detail — wording is kept verbatim from
//! the source behaviour so that confidence parsing (see [`crate::parse`])
//! keeps working against the response shape it asks for.

const SYSTEM_PROMPT: &str = "You are describing video surveillance events for home security and accessibility. Provide detailed, accurate descriptions.";

const CARRIER_IDENTIFICATION: &str = "\nIf you see a delivery person or truck, identify the carrier:\n- FedEx (purple/orange colors, FedEx logo)\n- UPS (brown uniform, brown truck)\n- USPS (blue uniform, postal logo, mail truck)\n- Amazon (blue vest, Amazon logo, Amazon van)\n- DHL (yellow/red colors, DHL logo)\nInclude the carrier name in your description.";

const SINGLE_FRAME_USER_PROMPT: &str = "Describe what you see in this image. Include: WHO (people, their appearance, clothing), WHAT (objects, vehicles, packages), WHERE (location in frame), and ACTIONS (what is happening). Be specific and detailed.\n";

const CONFIDENCE_INSTRUCTION: &str = "\n\nAfter your description, rate your confidence in this description from 0 to 100, where:\n- 0-30: Very uncertain, limited visibility or unclear action\n- 31-50: Somewhat uncertain, some ambiguity\n- 51-70: Moderately confident\n- 71-90: Confident\n- 91-100: Very confident, clear view and obvious action\n\nRespond in this exact JSON format:\n{\"description\": \"your detailed description here\", \"confidence\": 85}";

const MULTI_FRAME_INTRO_TEMPLATE: &str = "You are analyzing a sequence of {num_frames} frames from a security camera video, shown in chronological order.\n\nYour task is to describe WHAT HAPPENED - focus on the narrative and action over time:\n\n1. **Actions and movements** - Use action verbs: walked, arrived, departed, placed, picked up, approached, entered, exited, turned, stopped, ran, carried, delivered, rang, opened, closed\n2. **Direction of travel** - entering frame, exiting frame, left to right, right to left, approaching camera, moving away, circling, pacing\n3. **Sequence of events** - First... then... next... finally... Describe the progression\n4. **Who or what is present** - People (appearance, clothing, items carried), vehicles, animals, packages, objects\n\nIMPORTANT - Use dynamic descriptions, NOT static ones:\n- GOOD: \"A delivery person approached the front door, placed a package on the step, then departed walking left toward the street.\"\n- BAD: \"A person is visible near the front door. There is a package on the ground.\"\n- GOOD: \"A car pulled into the driveway and parked. The driver exited and walked toward the house.\"\n- BAD: \"A car is parked in the driveway. A person is standing nearby.\"";

const MULTI_FRAME_OUTRO: &str = "\n\nBe specific about the narrative - this is video showing motion over time, not a static photograph. Describe the complete sequence of what happened.";

const VIDEO_USER_PROMPT: &str = "You are analyzing a short security camera video clip.\n\nDescribe WHAT HAPPENED over the course of the clip as a narrative: who or what appeared, how they moved through the scene, what they did, and how the clip ends. Use action verbs and note direction of travel. Include people (appearance, clothing, items carried), vehicles, animals and packages.";

/// A fully assembled system/user prompt pair ready to send to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Context used to tailor a prompt to one event.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub camera_name: &'a str,
    pub timestamp_rfc3339: &'a str,
    pub detected_objects: &'a [String],
    pub custom_prompt: Option<&'a str>,
    pub audio_transcription: Option<&'a str>,
    pub is_doorbell: bool,
}

fn detection_line(ctx: &PromptContext<'_>) -> String {
    format!(
        "\nCamera: {} | Timestamp: {} | Detected: {}",
        ctx.camera_name,
        ctx.timestamp_rfc3339,
        if ctx.detected_objects.is_empty() {
            "unspecified".to_string()
        } else {
            ctx.detected_objects.join(", ")
        }
    )
}

fn audio_line(ctx: &PromptContext<'_>) -> Option<String> {
    ctx.audio_transcription
        .filter(|t| !t.is_empty())
        .map(|t| format!("\n\nAudio transcription from the doorbell: \"{t}\""))
}

fn doorbell_line(ctx: &PromptContext<'_>) -> Option<&'static str> {
    ctx.is_doorbell.then_some(
        "\n\nThis is a doorbell camera. If a visitor speaks or rings the bell, note that in the description.",
    )
}

/// Builds the prompt for a single still frame.
#[must_use]
pub fn single_frame(ctx: &PromptContext<'_>) -> PromptPair {
    let mut user = ctx
        .custom_prompt
        .map(str::to_string)
        .unwrap_or_else(|| format!("{SINGLE_FRAME_USER_PROMPT}{CARRIER_IDENTIFICATION}"));
    user.push_str(&detection_line(ctx));
    if let Some(doorbell) = doorbell_line(ctx) {
        user.push_str(doorbell);
    }
    if let Some(audio) = audio_line(ctx) {
        user.push_str(&audio);
    }
    user.push_str(CONFIDENCE_INSTRUCTION);

    PromptPair {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Builds the temporal-narrative prompt for a sequence of `num_frames`
/// frames sampled from one clip.
#[must_use]
pub fn multi_frame(ctx: &PromptContext<'_>, num_frames: usize) -> PromptPair {
    let mut user = ctx.custom_prompt.map(str::to_string).unwrap_or_else(|| {
        let intro = MULTI_FRAME_INTRO_TEMPLATE.replace("{num_frames}", &num_frames.to_string());
        format!("{intro}{CARRIER_IDENTIFICATION}{MULTI_FRAME_OUTRO}")
    });
    user.push_str(&detection_line(ctx));
    if let Some(doorbell) = doorbell_line(ctx) {
        user.push_str(doorbell);
    }
    if let Some(audio) = audio_line(ctx) {
        user.push_str(&audio);
    }
    user.push_str(CONFIDENCE_INSTRUCTION);

    PromptPair {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Builds the narrative prompt for a natively uploaded clip.
#[must_use]
pub fn video(ctx: &PromptContext<'_>) -> PromptPair {
    let mut user = ctx
        .custom_prompt
        .map(str::to_string)
        .unwrap_or_else(|| format!("{VIDEO_USER_PROMPT}{CARRIER_IDENTIFICATION}"));
    user.push_str(&detection_line(ctx));
    if let Some(doorbell) = doorbell_line(ctx) {
        user.push_str(doorbell);
    }
    if let Some(audio) = audio_line(ctx) {
        user.push_str(&audio);
    }
    user.push_str(CONFIDENCE_INSTRUCTION);

    PromptPair {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
