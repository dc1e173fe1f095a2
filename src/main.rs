fn main() -> anyhow::Result<()> {
    obs_scenes_lib::run()
}
