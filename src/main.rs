// Replays newline-delimited frames and push messages from stdin.
fn main() -> anyhow::Result<()> {
    smart_mirror_lib::run()
}
