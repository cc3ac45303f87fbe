fn main() -> anyhow::Result<()> {
    clip_recorder_lib::run()
}
